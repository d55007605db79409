use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    /// SIGTERM
    Graceful,
    /// SIGKILL
    Forced,
}

impl SignalKind {
    pub fn from_force(force: bool) -> Self {
        if force {
            SignalKind::Forced
        } else {
            SignalKind::Graceful
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SignalKind::Graceful => "SIGTERM",
            SignalKind::Forced => "SIGKILL",
        }
    }

    fn as_sysinfo(self) -> Signal {
        match self {
            SignalKind::Graceful => Signal::Term,
            SignalKind::Forced => Signal::Kill,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KillResult {
    Success(u32, &'static str),
    Failed(u32, String),
    NotFound(u32),
}

impl KillResult {
    pub fn is_success(&self) -> bool {
        matches!(self, KillResult::Success(..))
    }
}

pub trait Signaller: Send + Sync {
    fn signal(&self, pid: u32, kind: SignalKind) -> KillResult;
}

/// Delivers signals through `sysinfo`, refreshing only the target PID.
pub struct SysinfoSignaller {
    sys: Mutex<System>,
}

impl Default for SysinfoSignaller {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoSignaller {
    pub fn new() -> Self {
        Self {
            sys: Mutex::new(System::new()),
        }
    }
}

impl Signaller for SysinfoSignaller {
    fn signal(&self, pid: u32, kind: SignalKind) -> KillResult {
        let Ok(mut sys) = self.sys.lock() else {
            return KillResult::Failed(pid, "signal state poisoned".to_string());
        };
        let pids = [Pid::from_u32(pid)];
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&pids),
            true,
            ProcessRefreshKind::nothing(),
        );
        kill_process(&sys, pid, kind)
    }
}

pub fn kill_process(sys: &System, pid: u32, kind: SignalKind) -> KillResult {
    let sysinfo_pid = Pid::from_u32(pid);
    match sys.process(sysinfo_pid) {
        Some(process) => {
            let signal_name = kind.name();
            match process.kill_with(kind.as_sysinfo()) {
                Some(true) => KillResult::Success(pid, signal_name),
                Some(false) => {
                    KillResult::Failed(pid, format!("Failed to send {signal_name} to PID {pid}"))
                }
                None => unsupported_signal(pid, kind, || process.kill()),
            }
        }
        None => KillResult::NotFound(pid),
    }
}

/// Handles a platform without the requested signal. Only a forced request may
/// fall back to an unconditional kill; a graceful one is never escalated.
fn unsupported_signal(pid: u32, kind: SignalKind, kill: impl FnOnce() -> bool) -> KillResult {
    match kind {
        SignalKind::Graceful => KillResult::Failed(
            pid,
            format!("{} is not supported on this platform", kind.name()),
        ),
        SignalKind::Forced if kill() => KillResult::Success(pid, kind.name()),
        SignalKind::Forced => {
            KillResult::Failed(pid, format!("Failed to kill PID {pid} (permission denied?)"))
        }
    }
}
