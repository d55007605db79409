//! The live process table and the task that owns it.
//!
//! All reads and writes go through [`TableHandle`], which forwards them to a
//! single task; requests are applied one at a time in arrival order.

use std::collections::{BTreeMap, HashMap, HashSet};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::system::process::{Metrics, ProcessIdentity, TrackedProcess, WindowMetadata};
use crate::system::snapshot::Snapshot;

const MAILBOX: usize = 64;

#[derive(Debug, Default)]
pub struct LiveTable {
    processes: BTreeMap<u32, TrackedProcess>,
    system_cpu_percent: Option<f64>,
}

impl LiveTable {
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    pub fn get(&self, pid: u32) -> Option<&TrackedProcess> {
        self.processes.get(&pid)
    }

    pub fn pids(&self) -> Vec<u32> {
        self.processes.keys().copied().collect()
    }

    /// Drops every entry whose PID is not in `live`; returns how many went.
    pub fn retain_pids(&mut self, live: &HashSet<u32>) -> usize {
        let before = self.processes.len();
        self.processes.retain(|pid, _| live.contains(pid));
        before - self.processes.len()
    }

    /// Creates or refreshes an entry from a quick read. An existing entry
    /// takes the new identity and MEM% but keeps its last measured CPU% and
    /// window metadata.
    pub fn upsert(&mut self, identity: ProcessIdentity, metrics: Metrics) {
        match self.processes.get_mut(&identity.pid) {
            Some(existing) => {
                existing.identity = identity;
                existing.metrics.mem = metrics.mem;
            }
            None => {
                self.processes
                    .insert(identity.pid, TrackedProcess::new(identity, metrics));
            }
        }
    }

    /// Updates metrics of an existing entry only; never resurrects a PID.
    pub fn refine(&mut self, pid: u32, metrics: Metrics) -> bool {
        match self.processes.get_mut(&pid) {
            Some(existing) => {
                existing.metrics = metrics;
                true
            }
            None => false,
        }
    }

    /// Returns the number of incoming entries with no live PID.
    pub fn merge_windows(&mut self, windows: HashMap<u32, WindowMetadata>) -> usize {
        let mut unmatched = 0;
        for (pid, window) in windows {
            match self.processes.get_mut(&pid) {
                Some(process) => process.window = Some(window),
                None => unmatched += 1,
            }
        }
        unmatched
    }

    pub fn remove(&mut self, pid: u32) -> bool {
        self.processes.remove(&pid).is_some()
    }

    pub fn set_system_cpu(&mut self, percent: f64) {
        self.system_cpu_percent = Some(percent);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(
            self.processes.values().cloned().collect(),
            self.system_cpu_percent,
        )
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Retain { live, reply } => {
                let _ = reply.send(self.retain_pids(&live));
            }
            Command::Upsert { entries, reply } => {
                for (identity, metrics) in entries {
                    self.upsert(identity, metrics);
                }
                let _ = reply.send(self.len());
            }
            Command::Refine {
                entries,
                system_cpu_percent,
                reply,
            } => {
                let updated = entries
                    .into_iter()
                    .filter(|(pid, metrics)| self.refine(*pid, *metrics))
                    .count();
                if let Some(percent) = system_cpu_percent {
                    self.set_system_cpu(percent);
                }
                let _ = reply.send(updated);
            }
            Command::MergeWindows { windows, reply } => {
                let _ = reply.send(self.merge_windows(windows));
            }
            Command::Remove { pid, reply } => {
                let _ = reply.send(self.remove(pid));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }
}

enum Command {
    Retain {
        live: HashSet<u32>,
        reply: oneshot::Sender<usize>,
    },
    Upsert {
        entries: Vec<(ProcessIdentity, Metrics)>,
        reply: oneshot::Sender<usize>,
    },
    Refine {
        entries: Vec<(u32, Metrics)>,
        system_cpu_percent: Option<f64>,
        reply: oneshot::Sender<usize>,
    },
    MergeWindows {
        windows: HashMap<u32, WindowMetadata>,
        reply: oneshot::Sender<usize>,
    },
    Remove {
        pid: u32,
        reply: oneshot::Sender<bool>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
}

#[derive(Clone)]
pub struct TableHandle {
    tx: mpsc::Sender<Command>,
}

impl TableHandle {
    /// Moves `table` into its owning task. The task ends when the last handle
    /// is dropped.
    pub fn spawn(table: LiveTable) -> Self {
        let (tx, mut rx) = mpsc::channel(MAILBOX);
        tokio::spawn(async move {
            let mut table = table;
            while let Some(command) = rx.recv().await {
                table.apply(command);
            }
            debug!("live table closed");
        });
        Self { tx }
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> Command) -> Option<R> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(make(reply)).await.is_err() {
            warn!("live table is gone");
            return None;
        }
        response.await.ok()
    }

    pub async fn retain(&self, live: HashSet<u32>) -> usize {
        self.request(|reply| Command::Retain { live, reply })
            .await
            .unwrap_or(0)
    }

    pub async fn upsert(&self, entries: Vec<(ProcessIdentity, Metrics)>) -> usize {
        self.request(|reply| Command::Upsert { entries, reply })
            .await
            .unwrap_or(0)
    }

    pub async fn refine(
        &self,
        entries: Vec<(u32, Metrics)>,
        system_cpu_percent: Option<f64>,
    ) -> usize {
        self.request(|reply| Command::Refine {
            entries,
            system_cpu_percent,
            reply,
        })
        .await
        .unwrap_or(0)
    }

    pub async fn merge_windows(&self, windows: HashMap<u32, WindowMetadata>) -> usize {
        self.request(|reply| Command::MergeWindows { windows, reply })
            .await
            .unwrap_or(0)
    }

    pub async fn remove(&self, pid: u32) -> bool {
        self.request(|reply| Command::Remove { pid, reply })
            .await
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }
}
