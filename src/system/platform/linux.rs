use std::fs;
use std::path::PathBuf;

use color_eyre::eyre::{Result, WrapErr};

use super::{CpuTotals, DEFAULT_CLOCK_RATE, ProcError, ProcStat, ProcessSource};

/// `/proc`-backed process source.
pub struct ProcFs {
    root: PathBuf,
    page_size: u64,
    clock_rate: u64,
}

impl ProcFs {
    pub fn open() -> Result<Self> {
        Self::open_at("/proc")
    }

    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::read_dir(&root).wrap_err_with(|| format!("cannot open {}", root.display()))?;

        // SAFETY: sysconf has no preconditions.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let clock_rate = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };

        Ok(Self {
            root,
            page_size: if page_size > 0 { page_size as u64 } else { 4096 },
            clock_rate: if clock_rate > 0 {
                clock_rate as u64
            } else {
                DEFAULT_CLOCK_RATE
            },
        })
    }

    fn pid_path(&self, pid: u32, file: &str) -> PathBuf {
        self.root.join(pid.to_string()).join(file)
    }

    fn read_pid_file(&self, pid: u32, file: &str) -> Result<String, ProcError> {
        let path = self.pid_path(pid, file);
        fs::read_to_string(&path).map_err(|e| ProcError::io(Some(pid), path, e))
    }

    fn read_root_file(&self, file: &str) -> Result<(PathBuf, String), ProcError> {
        let path = self.root.join(file);
        let contents = fs::read_to_string(&path).map_err(|e| ProcError::io(None, &path, e))?;
        Ok((path, contents))
    }
}

impl ProcessSource for ProcFs {
    fn all_pids(&self) -> Result<Vec<u32>, ProcError> {
        let entries = fs::read_dir(&self.root).map_err(|e| ProcError::io(None, &self.root, e))?;
        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect();
        pids.sort_unstable();
        Ok(pids)
    }

    fn stat(&self, pid: u32) -> Result<ProcStat, ProcError> {
        let contents = self.read_pid_file(pid, "stat")?;
        parse_stat(&contents).ok_or_else(|| ProcError::Parse {
            path: self.pid_path(pid, "stat"),
            field: "stat",
        })
    }

    fn comm(&self, pid: u32) -> Result<String, ProcError> {
        Ok(self.read_pid_file(pid, "comm")?.trim_end().to_string())
    }

    fn cmdline(&self, pid: u32) -> Result<Vec<String>, ProcError> {
        let raw = self.read_pid_file(pid, "cmdline")?;
        Ok(raw
            .split('\0')
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn owner_uid(&self, pid: u32) -> Result<u32, ProcError> {
        let contents = self.read_pid_file(pid, "status")?;
        parse_status_uid(&contents).ok_or_else(|| ProcError::Parse {
            path: self.pid_path(pid, "status"),
            field: "Uid",
        })
    }

    fn cpu_totals(&self) -> Result<CpuTotals, ProcError> {
        let (path, contents) = self.read_root_file("stat")?;
        parse_cpu_totals(&contents).ok_or(ProcError::Parse { path, field: "cpu" })
    }

    fn mem_total_kb(&self) -> Result<u64, ProcError> {
        let (path, contents) = self.read_root_file("meminfo")?;
        parse_mem_total(&contents).ok_or(ProcError::Parse {
            path,
            field: "MemTotal",
        })
    }

    fn page_size(&self) -> u64 {
        self.page_size
    }

    fn clock_rate(&self) -> u64 {
        self.clock_rate
    }
}

fn parse_stat(contents: &str) -> Option<ProcStat> {
    // comm may contain spaces and parens, so split after the last ')'
    let after_comm = contents.rfind(')')? + 1;
    let fields: Vec<&str> = contents[after_comm..].split_whitespace().collect();
    // state(0) ... utime(11) stime(12) cutime(13) cstime(14) ... rss(21)
    let field = |i: usize| -> Option<u64> { fields.get(i)?.parse().ok() };
    Some(ProcStat {
        utime: field(11)?,
        stime: field(12)?,
        // cutime/cstime are signed in the kernel ABI; negative values read as 0
        cutime: field(13).unwrap_or(0),
        cstime: field(14).unwrap_or(0),
        rss_pages: field(21).unwrap_or(0),
    })
}

fn parse_status_uid(contents: &str) -> Option<u32> {
    // "Uid:\treal\teffective\tsaved\tfs"
    let line = contents.lines().find(|l| l.starts_with("Uid:"))?;
    line.split_whitespace().nth(1)?.parse().ok()
}

fn parse_cpu_totals(contents: &str) -> Option<CpuTotals> {
    let line = contents.lines().find(|l| l.starts_with("cpu "))?;
    let values: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|v| v.parse().unwrap_or(0))
        .collect();
    let at = |i: usize| values.get(i).copied().unwrap_or(0);
    if values.len() < 4 {
        return None;
    }
    Some(CpuTotals {
        user: at(0),
        nice: at(1),
        system: at(2),
        idle: at(3),
        iowait: at(4),
        irq: at(5),
        softirq: at(6),
        steal: at(7),
    })
}

fn parse_mem_total(contents: &str) -> Option<u64> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse().ok())
}
