use std::time::SystemTime;

use serde::Serialize;

use super::process::TrackedProcess;

/// Point-in-time copy of the live process table, ordered by PID.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub processes: Vec<TrackedProcess>,
    pub timestamp: SystemTime,
    /// Aggregate CPU busy percentage, absent until the first accurate pass.
    pub system_cpu_percent: Option<f64>,
}

impl Snapshot {
    pub fn new(processes: Vec<TrackedProcess>, system_cpu_percent: Option<f64>) -> Self {
        Self {
            processes,
            timestamp: SystemTime::now(),
            system_cpu_percent,
        }
    }

    pub fn pids(&self) -> Vec<u32> {
        self.processes.iter().map(|p| p.pid()).collect()
    }

    pub fn get(&self, pid: u32) -> Option<&TrackedProcess> {
        self.processes.iter().find(|p| p.pid() == pid)
    }
}
