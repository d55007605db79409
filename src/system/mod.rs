pub mod enumerator;
pub mod kill;
pub mod platform;
pub mod process;
pub mod sampler;
pub mod snapshot;
