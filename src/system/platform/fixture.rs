use std::collections::BTreeMap;
use std::sync::RwLock;

use super::{CpuTotals, DEFAULT_CLOCK_RATE, ProcError, ProcStat, ProcessSource};

/// One process held by a [`StaticSource`].
#[derive(Clone, Debug, Default)]
pub struct StaticProcess {
    pub name: String,
    pub cmdline: Vec<String>,
    pub uid: u32,
    pub stat: ProcStat,
    /// Added to `utime` after every `stat` read, so two reads separated by a
    /// sampling window observe a known tick delta.
    pub ticks_per_read: u64,
}

impl StaticProcess {
    pub fn new(name: &str, uid: u32) -> Self {
        Self {
            name: name.to_string(),
            cmdline: vec![format!("/usr/bin/{name}")],
            uid,
            ..Default::default()
        }
    }

    pub fn with_rss_pages(mut self, pages: u64) -> Self {
        self.stat.rss_pages = pages;
        self
    }

    pub fn with_ticks_per_read(mut self, ticks: u64) -> Self {
        self.ticks_per_read = ticks;
        self
    }
}

/// In-memory process source for replays, benchmarks and tests.
pub struct StaticSource {
    processes: RwLock<BTreeMap<u32, StaticProcess>>,
    totals: RwLock<CpuTotals>,
    mem_total_kb: u64,
    page_size: u64,
    clock_rate: u64,
}

impl Default for StaticSource {
    fn default() -> Self {
        Self::new(8 * 1024 * 1024, 4096, DEFAULT_CLOCK_RATE)
    }
}

impl StaticSource {
    pub fn new(mem_total_kb: u64, page_size: u64, clock_rate: u64) -> Self {
        Self {
            processes: RwLock::new(BTreeMap::new()),
            totals: RwLock::new(CpuTotals::default()),
            mem_total_kb,
            page_size,
            clock_rate,
        }
    }

    pub fn insert(&self, pid: u32, process: StaticProcess) {
        if let Ok(mut processes) = self.processes.write() {
            processes.insert(pid, process);
        }
    }

    pub fn remove(&self, pid: u32) {
        if let Ok(mut processes) = self.processes.write() {
            processes.remove(&pid);
        }
    }

    pub fn set_cpu_totals(&self, totals: CpuTotals) {
        if let Ok(mut current) = self.totals.write() {
            *current = totals;
        }
    }

    fn with_process<T>(&self, pid: u32, f: impl FnOnce(&StaticProcess) -> T) -> Result<T, ProcError> {
        let processes = self.processes.read().map_err(|_| ProcError::NotFound(pid))?;
        processes.get(&pid).map(f).ok_or(ProcError::NotFound(pid))
    }
}

impl ProcessSource for StaticSource {
    fn all_pids(&self) -> Result<Vec<u32>, ProcError> {
        Ok(self
            .processes
            .read()
            .map(|p| p.keys().copied().collect())
            .unwrap_or_default())
    }

    fn stat(&self, pid: u32) -> Result<ProcStat, ProcError> {
        let mut processes = self.processes.write().map_err(|_| ProcError::NotFound(pid))?;
        let process = processes.get_mut(&pid).ok_or(ProcError::NotFound(pid))?;
        let stat = process.stat;
        process.stat.utime += process.ticks_per_read;
        Ok(stat)
    }

    fn comm(&self, pid: u32) -> Result<String, ProcError> {
        self.with_process(pid, |p| p.name.clone())
    }

    fn cmdline(&self, pid: u32) -> Result<Vec<String>, ProcError> {
        self.with_process(pid, |p| p.cmdline.clone())
    }

    fn owner_uid(&self, pid: u32) -> Result<u32, ProcError> {
        self.with_process(pid, |p| p.uid)
    }

    fn cpu_totals(&self) -> Result<CpuTotals, ProcError> {
        Ok(self.totals.read().map(|t| *t).unwrap_or_default())
    }

    fn mem_total_kb(&self) -> Result<u64, ProcError> {
        Ok(self.mem_total_kb)
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn clock_rate(&self) -> u64 {
        self.clock_rate
    }
}
