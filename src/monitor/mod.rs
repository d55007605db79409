//! Poll loop that keeps the live process table current and publishes
//! snapshots of it.
//!
//! Each tick enumerates processes, prunes the table, publishes a snapshot with
//! quick metrics, then refines CPU figures over the sampling window in the
//! background and publishes again. Ticks may overlap; the table converges
//! because every write is an upsert keyed by PID.

pub mod table;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::publish::Publisher;
use crate::system::enumerator::Enumerator;
use crate::system::kill::{KillResult, SignalKind, Signaller};
use crate::system::platform::CpuTotals;
use crate::system::process::{Metrics, ProcessIdentity, WindowMetadata};
use crate::system::sampler::Sampler;
use crate::system::snapshot::Snapshot;
use crate::window::WindowSource;

pub use table::{LiveTable, TableHandle};

/// Which processes the table tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingMode {
    #[default]
    All,
    /// Only processes that own a window-manager client.
    Windowed,
}

impl FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(TrackingMode::All),
            "windowed" | "hypr" => Ok(TrackingMode::Windowed),
            other => Err(format!("invalid tracking mode: {other}")),
        }
    }
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::All => f.write_str("all"),
            TrackingMode::Windowed => f.write_str("windowed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationRequest {
    pub pid: u32,
    /// SIGKILL instead of SIGTERM.
    pub force: bool,
}

impl TerminationRequest {
    pub fn graceful(pid: u32) -> Self {
        Self { pid, force: false }
    }

    pub fn forced(pid: u32) -> Self {
        Self { pid, force: true }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub poll_interval: Duration,
    pub mode: TrackingMode,
    /// Upper bound on concurrent quick-metric reads.
    pub quick_workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(2000),
            mode: TrackingMode::All,
            quick_workers: 16,
        }
    }
}

pub struct Monitor {
    config: MonitorConfig,
    enumerator: Enumerator,
    sampler: Arc<Sampler>,
    windows: Arc<dyn WindowSource>,
    table: TableHandle,
    snapshots: Publisher<Snapshot>,
}

impl Monitor {
    /// Must be called inside a tokio runtime; spawns the table task.
    pub fn new(
        config: MonitorConfig,
        enumerator: Enumerator,
        sampler: Arc<Sampler>,
        windows: Arc<dyn WindowSource>,
        snapshots: Publisher<Snapshot>,
    ) -> Self {
        Self {
            config,
            enumerator,
            sampler,
            windows,
            table: TableHandle::spawn(LiveTable::default()),
            snapshots,
        }
    }

    pub fn table(&self) -> &TableHandle {
        &self.table
    }

    /// Fires a poll every interval until the runtime shuts down.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            mode = %self.config.mode,
            "task manager started"
        );
        loop {
            ticker.tick().await;
            let this = Arc::clone(&self);
            tokio::spawn(async move {
                this.poll_once().await;
            });
        }
    }

    /// Runs one poll up to and including the quick publish. The returned task
    /// completes once the refined snapshot has been published.
    pub async fn poll_once(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let span = info_span!("poll");
        async {
            let (listed, windows) = tokio::join!(self.enumerator.list_all(), self.fetch_windows());
            let mut identities = match listed {
                Ok(identities) => identities,
                Err(err) => {
                    error!(error = %err, "could not enumerate processes");
                    return None;
                }
            };
            if self.config.mode == TrackingMode::Windowed {
                identities.retain(|p| windows.contains_key(&p.pid));
            }

            let live: HashSet<u32> = identities.iter().map(|p| p.pid).collect();
            let removed = self.table.retain(live).await;

            let quick = self.quick_pass(identities).await;
            let pids: Vec<u32> = quick.iter().map(|(identity, _)| identity.pid).collect();
            let tracked = self.table.upsert(quick).await;

            let unmatched = self.table.merge_windows(windows).await;
            if unmatched > 0 {
                debug!(unmatched, "window metadata without a tracked process");
            }
            info!(tracked, removed, "quick pass complete");
            self.publish_snapshot().await;

            let before = self.sampler.system_totals().await.ok();
            let this = Arc::clone(self);
            Some(tokio::spawn(
                async move { this.accurate_pass(pids, before).await }
                    .instrument(info_span!("accurate")),
            ))
        }
        .instrument(span)
        .await
    }

    async fn fetch_windows(&self) -> HashMap<u32, WindowMetadata> {
        let windows = Arc::clone(&self.windows);
        match tokio::task::spawn_blocking(move || windows.list_window_metadata()).await {
            Ok(Ok(windows)) => windows,
            Ok(Err(err)) => {
                warn!(error = %err, "window metadata unavailable");
                HashMap::new()
            }
            Err(err) => {
                warn!(error = %err, "window metadata task failed");
                HashMap::new()
            }
        }
    }

    async fn quick_pass(&self, identities: Vec<ProcessIdentity>) -> Vec<(ProcessIdentity, Metrics)> {
        stream::iter(identities)
            .map(|identity| {
                let sampler = Arc::clone(&self.sampler);
                async move {
                    let pid = identity.pid;
                    let metrics = tokio::task::spawn_blocking(move || sampler.quick_metrics(pid))
                        .await
                        .unwrap_or(Metrics::ZERO);
                    (identity, metrics)
                }
            })
            .buffer_unordered(self.config.quick_workers.max(1))
            .collect()
            .await
    }

    /// `before` holds the system CPU counters read when the window opened.
    async fn accurate_pass(&self, pids: Vec<u32>, before: Option<CpuTotals>) {
        let refined: Vec<(u32, Metrics)> = join_all(pids.into_iter().map(|pid| {
            let sampler = &self.sampler;
            async move { (pid, sampler.accurate_metrics(pid).await) }
        }))
        .await;

        let system_cpu = match (before, self.sampler.system_totals().await.ok()) {
            (Some(before), Some(after)) => Some(after.busy_percent_since(&before)),
            _ => None,
        };
        let updated = self.table.refine(refined, system_cpu).await;
        debug!(updated, "accurate pass complete");
        self.publish_snapshot().await;
    }

    async fn publish_snapshot(&self) {
        if let Some(snapshot) = self.table.snapshot().await {
            self.snapshots.publish(snapshot);
        }
    }

    /// Serves termination requests one at a time until the queue closes.
    pub async fn run_terminations(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<TerminationRequest>,
        signaller: Arc<dyn Signaller>,
    ) {
        while let Some(request) = requests.recv().await {
            self.terminate(request, &signaller).await;
        }
        debug!("termination queue closed");
    }

    pub async fn terminate(
        &self,
        request: TerminationRequest,
        signaller: &Arc<dyn Signaller>,
    ) -> KillResult {
        let TerminationRequest { pid, force } = request;
        let kind = SignalKind::from_force(force);
        let signaller = Arc::clone(signaller);
        let result = tokio::task::spawn_blocking(move || signaller.signal(pid, kind))
            .await
            .unwrap_or_else(|err| KillResult::Failed(pid, err.to_string()));

        match &result {
            KillResult::Success(pid, signal) => {
                info!(pid, signal, "process signalled");
                self.table.remove(*pid).await;
                self.publish_snapshot().await;
            }
            KillResult::Failed(pid, reason) => {
                warn!(pid, reason = %reason, "termination failed");
            }
            KillResult::NotFound(pid) => {
                warn!(pid, "termination target not found");
            }
        }
        result
    }
}
