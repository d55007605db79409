//! Plain-text and JSON renderings of display data for the headless binary.

use std::fmt::Write;

use crate::system::process::TrackedProcess;
use crate::view::DisplayData;

const NAME_WIDTH: usize = 24;

/// One-line overview: counts, system CPU and the active ordering.
pub fn header(data: &DisplayData) -> String {
    let system_cpu = data
        .system_cpu_percent
        .map(|pct| format!("{pct:.1}%"))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} processes  {} workspaces  cpu {}  sort {}/{}",
        data.processes.len(),
        data.workspace_count(),
        system_cpu,
        data.options.sort_key,
        data.options.sort_order,
    )
}

/// Header line, one line per workspace, then the first `limit` processes.
pub fn summary(data: &DisplayData, limit: usize) -> String {
    let mut out = header(data);
    out.push('\n');

    for ws in &data.workspaces {
        let _ = writeln!(
            out,
            "  [{}] {} procs  cpu {:.1}%  mem {:.1}%",
            ws.workspace_name, ws.process_count, ws.total_cpu, ws.total_mem
        );
    }

    let _ = writeln!(
        out,
        "{:>7}  {:<10} {:>6} {:>6}  {}",
        "PID", "USER", "CPU%", "MEM%", "NAME"
    );
    for process in data.processes.iter().take(limit) {
        out.push_str(&row(process));
        out.push('\n');
    }
    out
}

fn row(process: &TrackedProcess) -> String {
    format!(
        "{:>7}  {:<10} {:>6.1} {:>6.1}  {}",
        process.identity.pid,
        truncate(&process.identity.user, 10),
        process.metrics.cpu,
        process.metrics.mem,
        truncate(&process.identity.name, NAME_WIDTH),
    )
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

pub fn json_line(data: &DisplayData) -> serde_json::Result<String> {
    serde_json::to_string(data)
}
