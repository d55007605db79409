use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;

use super::options::ViewOptions;
use super::sort;
use crate::system::process::TrackedProcess;
use crate::system::snapshot::Snapshot;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorkspaceAggregate {
    pub workspace_id: i64,
    pub workspace_name: String,
    pub processes: Vec<TrackedProcess>,
    pub process_count: usize,
    /// Sum over members, not an average.
    pub total_cpu: f64,
    pub total_mem: f64,
}

impl WorkspaceAggregate {
    fn new(workspace_id: i64, workspace_name: String) -> Self {
        Self {
            workspace_id,
            workspace_name,
            processes: Vec::new(),
            process_count: 0,
            total_cpu: 0.0,
            total_mem: 0.0,
        }
    }

    fn push(&mut self, process: TrackedProcess) {
        self.total_cpu += process.metrics.cpu;
        self.total_mem += process.metrics.mem;
        self.processes.push(process);
        self.process_count = self.processes.len();
    }
}

/// Which process list a screen shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    All,
    Workspace(i64),
}

/// Display-ready view of one snapshot under one set of view options.
#[derive(Clone, Debug, Serialize)]
pub struct DisplayData {
    pub processes: Vec<TrackedProcess>,
    pub workspaces: Vec<WorkspaceAggregate>,
    pub options: ViewOptions,
    pub timestamp: SystemTime,
    pub system_cpu_percent: Option<f64>,
}

impl DisplayData {
    pub fn build(snapshot: &Snapshot, options: &ViewOptions) -> Self {
        let mut processes = snapshot.processes.clone();
        let workspaces = group_by_workspace(&processes, options);
        sort::apply(&mut processes, options);
        Self {
            processes,
            workspaces,
            options: *options,
            timestamp: snapshot.timestamp,
            system_cpu_percent: snapshot.system_cpu_percent,
        }
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn workspace(&self, id: i64) -> Option<&WorkspaceAggregate> {
        self.workspaces.iter().find(|w| w.workspace_id == id)
    }

    /// Empty for a workspace that no longer exists.
    pub fn processes_in(&self, scope: Scope) -> &[TrackedProcess] {
        match scope {
            Scope::All => &self.processes,
            Scope::Workspace(id) => self
                .workspace(id)
                .map(|w| w.processes.as_slice())
                .unwrap_or(&[]),
        }
    }
}

/// Buckets windowed processes by workspace id, sorts each bucket with the
/// active options, and orders workspaces by name.
pub fn group_by_workspace(
    processes: &[TrackedProcess],
    options: &ViewOptions,
) -> Vec<WorkspaceAggregate> {
    let mut by_id: BTreeMap<i64, WorkspaceAggregate> = BTreeMap::new();
    for process in processes {
        let Some(window) = &process.window else {
            continue;
        };
        by_id
            .entry(window.workspace_id)
            .or_insert_with(|| {
                WorkspaceAggregate::new(window.workspace_id, window.workspace_name.clone())
            })
            .push(process.clone());
    }

    let mut workspaces: Vec<WorkspaceAggregate> = by_id.into_values().collect();
    for workspace in &mut workspaces {
        sort::apply(&mut workspace.processes, options);
    }
    workspaces.sort_by(|a, b| a.workspace_name.cmp(&b.workspace_name));
    workspaces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::process::{Metrics, ProcessIdentity, WindowMetadata};
    use crate::view::options::{SortKey, SortOrder};

    fn proc(pid: u32, cpu: f64, mem: f64, workspace: Option<(i64, &str)>) -> TrackedProcess {
        let mut p = TrackedProcess::new(
            ProcessIdentity {
                pid,
                name: format!("p{pid}"),
                user: "u".into(),
                command: String::new(),
            },
            Metrics { cpu, mem },
        );
        p.window = workspace.map(|(id, name)| WindowMetadata {
            workspace_id: id,
            workspace_name: name.to_string(),
            monitor: "0".into(),
            title: String::new(),
            class: String::new(),
        });
        p
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            vec![
                proc(1, 1.5, 2.0, Some((2, "web"))),
                proc(2, 10.0, 1.0, None),
                proc(3, 4.0, 0.5, Some((1, "code"))),
                proc(4, 0.5, 3.0, Some((2, "web"))),
                proc(5, 2.0, 0.25, Some((1, "code"))),
            ],
            Some(30.0),
        )
    }

    #[test]
    fn aggregates_sum_member_metrics() {
        let data = DisplayData::build(&snapshot(), &ViewOptions::default());
        let web = data.workspace(2).unwrap();
        assert_eq!(web.process_count, 2);
        assert_eq!(web.total_cpu, 1.5 + 0.5);
        assert_eq!(web.total_mem, 2.0 + 3.0);
    }

    #[test]
    fn only_windowed_processes_are_grouped() {
        let data = DisplayData::build(&snapshot(), &ViewOptions::default());
        assert_eq!(data.processes.len(), 5);
        let grouped: usize = data.workspaces.iter().map(|w| w.process_count).sum();
        assert_eq!(grouped, 4);
    }

    #[test]
    fn workspaces_ordered_by_name() {
        let data = DisplayData::build(&snapshot(), &ViewOptions::default());
        let names: Vec<&str> = data
            .workspaces
            .iter()
            .map(|w| w.workspace_name.as_str())
            .collect();
        assert_eq!(names, vec!["code", "web"]);
        assert_eq!(data.workspace_count(), 2);
    }

    #[test]
    fn members_use_the_global_sort() {
        let options = ViewOptions::new(SortKey::Cpu, SortOrder::Descending);
        let data = DisplayData::build(&snapshot(), &options);
        let global: Vec<u32> = data.processes.iter().map(|p| p.pid()).collect();
        assert_eq!(global, vec![2, 3, 5, 1, 4]);

        let code: Vec<u32> = data
            .processes_in(Scope::Workspace(1))
            .iter()
            .map(|p| p.pid())
            .collect();
        assert_eq!(code, vec![3, 5]);
        assert!(data.processes_in(Scope::Workspace(42)).is_empty());
    }

    #[test]
    fn carries_snapshot_fields() {
        let snap = snapshot();
        let data = DisplayData::build(&snap, &ViewOptions::default());
        assert_eq!(data.timestamp, snap.timestamp);
        assert_eq!(data.system_cpu_percent, Some(30.0));
    }
}
