pub mod commands;
pub mod config;
pub mod logging;
pub mod monitor;
pub mod pipeline;
pub mod publish;
pub mod render;
pub mod system;
pub mod view;
pub mod window;
