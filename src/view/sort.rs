use std::cmp::Ordering;

use super::options::{SortKey, SortOrder, ViewOptions};
use crate::system::process::TrackedProcess;

type Comparator = fn(&TrackedProcess, &TrackedProcess) -> Ordering;

/// Ascending comparator for each key; `None` has no comparator.
fn comparator(key: SortKey) -> Option<Comparator> {
    let compare: Comparator = match key {
        SortKey::None => return None,
        SortKey::Pid => |a, b| a.identity.pid.cmp(&b.identity.pid),
        SortKey::ProgramName => |a, b| a.identity.name.cmp(&b.identity.name),
        SortKey::User => |a, b| a.identity.user.cmp(&b.identity.user),
        SortKey::Cpu => |a, b| a.metrics.cpu.total_cmp(&b.metrics.cpu),
        SortKey::Mem => |a, b| a.metrics.mem.total_cmp(&b.metrics.mem),
    };
    Some(compare)
}

/// Stable sort by the active options. Descending reverses the ascending
/// comparison, so ties keep their input order either way.
pub fn apply(processes: &mut [TrackedProcess], options: &ViewOptions) {
    let Some(compare) = comparator(options.sort_key) else {
        return;
    };
    match options.sort_order {
        SortOrder::None => {}
        SortOrder::Ascending => processes.sort_by(compare),
        SortOrder::Descending => processes.sort_by(|a, b| compare(a, b).reverse()),
    }
}
