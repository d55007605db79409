use std::path::PathBuf;
use std::sync::Arc;

use color_eyre::eyre::Result;
use thiserror::Error;

mod fixture;
#[cfg(target_os = "linux")]
mod linux;

pub use fixture::{StaticProcess, StaticSource};
#[cfg(target_os = "linux")]
pub use linux::ProcFs;

/// Clock rate assumed when the kernel does not report one.
pub const DEFAULT_CLOCK_RATE: u64 = 100;

#[derive(Debug, Error)]
pub enum ProcError {
    #[error("process {0} not found")]
    NotFound(u32),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed {field} in {path}")]
    Parse { path: PathBuf, field: &'static str },

    #[error("blocking read did not complete: {0}")]
    Blocking(#[from] tokio::task::JoinError),
}

impl ProcError {
    pub fn io(pid: Option<u32>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        match (pid, source.kind()) {
            (Some(pid), std::io::ErrorKind::NotFound) => ProcError::NotFound(pid),
            // ESRCH surfaces when the process exits between open and read.
            (Some(pid), _) if source.raw_os_error() == Some(libc::ESRCH) => {
                ProcError::NotFound(pid)
            }
            _ => ProcError::Io {
                path: path.into(),
                source,
            },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProcError::NotFound(_))
    }
}

/// Per-process accounting counters, in clock ticks and pages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcStat {
    pub utime: u64,
    pub stime: u64,
    pub cutime: u64,
    pub cstime: u64,
    pub rss_pages: u64,
}

impl ProcStat {
    /// Ticks the process itself spent on a CPU (children excluded).
    pub fn busy_ticks(&self) -> u64 {
        self.utime + self.stime
    }
}

/// Aggregate tick counters from the `cpu` line of the kernel stat file.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CpuTotals {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuTotals {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }

    /// Busy percentage between two readings; 0 when no ticks elapsed.
    pub fn busy_percent_since(&self, earlier: &CpuTotals) -> f64 {
        let total = self.total().saturating_sub(earlier.total());
        if total == 0 {
            return 0.0;
        }
        let idle = self.idle_total().saturating_sub(earlier.idle_total());
        total.saturating_sub(idle) as f64 / total as f64 * 100.0
    }
}

/// Read-only view of the operating system's process accounting.
pub trait ProcessSource: Send + Sync {
    fn all_pids(&self) -> Result<Vec<u32>, ProcError>;
    fn stat(&self, pid: u32) -> Result<ProcStat, ProcError>;
    fn comm(&self, pid: u32) -> Result<String, ProcError>;
    fn cmdline(&self, pid: u32) -> Result<Vec<String>, ProcError>;
    fn owner_uid(&self, pid: u32) -> Result<u32, ProcError>;
    fn cpu_totals(&self) -> Result<CpuTotals, ProcError>;
    fn mem_total_kb(&self) -> Result<u64, ProcError>;
    fn page_size(&self) -> u64;
    fn clock_rate(&self) -> u64;
}

/// Opens the host's process source. Failing here aborts startup.
#[cfg(target_os = "linux")]
pub fn open() -> Result<Arc<dyn ProcessSource>> {
    Ok(Arc::new(ProcFs::open()?))
}

#[cfg(not(target_os = "linux"))]
pub fn open() -> Result<Arc<dyn ProcessSource>> {
    Err(color_eyre::eyre::eyre!(
        "no process source available on {}",
        std::env::consts::OS
    ))
}
