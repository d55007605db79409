//! Per-process CPU and memory sampling.
//!
//! Quick metrics come from a single read and report CPU as 0. Accurate metrics
//! read the accounting counters twice around a sleep of `tick` and convert the
//! tick delta to seconds before dividing by wall time.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::{Result, WrapErr};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::platform::{CpuTotals, ProcError, ProcStat, ProcessSource};
use super::process::Metrics;

pub struct Sampler {
    source: Arc<dyn ProcessSource>,
    total_memory_kb: u64,
    page_size: u64,
    clock_rate: u64,
    tick: Duration,
}

impl Sampler {
    /// Fails when total memory cannot be read, which makes every MEM% unusable.
    pub fn new(source: Arc<dyn ProcessSource>, tick: Duration) -> Result<Self> {
        let total_memory_kb = source
            .mem_total_kb()
            .wrap_err("cannot read total system memory")?;
        let page_size = source.page_size();
        let clock_rate = source.clock_rate();
        debug!(total_memory_kb, page_size, clock_rate, "sampler ready");
        Ok(Self {
            source,
            total_memory_kb,
            page_size,
            clock_rate,
            tick,
        })
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Reads the counters for `pid` on the blocking pool.
    pub async fn sample_now(&self, pid: u32) -> Result<ProcStat, ProcError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.stat(pid)).await?
    }

    pub async fn system_totals(&self) -> Result<CpuTotals, ProcError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.cpu_totals()).await?
    }

    /// Blocking; callers on the runtime wrap it in `spawn_blocking`.
    pub fn try_quick_metrics(&self, pid: u32) -> Result<Metrics, ProcError> {
        let stat = self.source.stat(pid)?;
        Ok(Metrics {
            cpu: 0.0,
            mem: mem_percent(stat.rss_pages, self.page_size, self.total_memory_kb),
        })
    }

    pub fn quick_metrics(&self, pid: u32) -> Metrics {
        self.try_quick_metrics(pid)
            .unwrap_or_else(|err| degraded(pid, "quick", err))
    }

    /// Suspends for the sampling tick between the two counter reads.
    pub async fn try_accurate_metrics(&self, pid: u32) -> Result<Metrics, ProcError> {
        let before = self.sample_now(pid).await?;
        let started = Instant::now();

        tokio::time::sleep(self.tick).await;

        let after = self.sample_now(pid).await?;
        let elapsed = started.elapsed();

        let delta = after.busy_ticks().saturating_sub(before.busy_ticks());
        let metrics = Metrics {
            cpu: cpu_percent(delta, self.clock_rate, elapsed),
            mem: mem_percent(after.rss_pages, self.page_size, self.total_memory_kb),
        };
        debug!(pid, cpu = metrics.cpu, mem = metrics.mem, "accurate sample");
        Ok(metrics)
    }

    pub async fn accurate_metrics(&self, pid: u32) -> Metrics {
        match self.try_accurate_metrics(pid).await {
            Ok(metrics) => metrics,
            Err(err) => degraded(pid, "accurate", err),
        }
    }
}

fn degraded(pid: u32, kind: &'static str, err: ProcError) -> Metrics {
    if err.is_not_found() {
        debug!(pid, kind, "process vanished while sampling");
    } else {
        warn!(pid, kind, error = %err, "sampling failed");
    }
    Metrics::ZERO
}

/// CPU utilization over `elapsed` for a delta of `ticks` clock ticks.
pub fn cpu_percent(ticks: u64, clock_rate: u64, elapsed: Duration) -> f64 {
    let elapsed = elapsed.as_secs_f64();
    if elapsed == 0.0 || clock_rate == 0 {
        return 0.0;
    }
    let process_seconds = ticks as f64 / clock_rate as f64;
    process_seconds / elapsed * 100.0
}

/// Resident memory as a share of total system memory.
pub fn mem_percent(rss_pages: u64, page_size: u64, total_memory_kb: u64) -> f64 {
    if total_memory_kb == 0 {
        return 0.0;
    }
    let resident = rss_pages as f64 * page_size as f64;
    resident / (total_memory_kb as f64 * 1024.0) * 100.0
}
