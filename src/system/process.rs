use serde::Serialize;

/// Identity of one process instance as read during enumeration.
///
/// Fields the OS refused to hand over (the process exited mid-read, or access
/// was denied) are left empty rather than failing the whole record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ProcessIdentity {
    pub pid: u32,
    pub name: String,
    pub user: String,
    pub command: String,
}

impl ProcessIdentity {
    pub fn is_partial(&self) -> bool {
        self.name.is_empty() || self.user.is_empty()
    }
}

/// CPU and memory utilization in percent.
///
/// CPU% is not clamped: a multi-threaded process or sampling skew can push it
/// past 100.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub cpu: f64,
    pub mem: f64,
}

impl Metrics {
    /// Value reported for a process that vanished while being sampled.
    pub const ZERO: Metrics = Metrics { cpu: 0.0, mem: 0.0 };
}

/// Window-manager placement of a process that owns a client window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WindowMetadata {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub monitor: String,
    pub title: String,
    pub class: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrackedProcess {
    pub identity: ProcessIdentity,
    pub metrics: Metrics,
    /// `None` for processes without a window; kept across polls until a
    /// fresh merge overwrites it.
    pub window: Option<WindowMetadata>,
}

impl TrackedProcess {
    pub fn new(identity: ProcessIdentity, metrics: Metrics) -> Self {
        Self {
            identity,
            metrics,
            window: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.identity.pid
    }

    pub fn workspace_id(&self) -> Option<i64> {
        self.window.as_ref().map(|w| w.workspace_id)
    }
}
