//! View-model: turns snapshots into sorted, workspace-grouped display data.

pub mod display;
pub mod options;
pub mod sort;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::publish::Publisher;
use crate::system::snapshot::Snapshot;

pub use display::{DisplayData, Scope, WorkspaceAggregate};
pub use options::{SortKey, SortOrder, ViewAction, ViewOptions};

pub struct ViewModel {
    options: ViewOptions,
    current: Option<Snapshot>,
    display: Publisher<DisplayData>,
}

impl ViewModel {
    pub fn new(options: ViewOptions, display: Publisher<DisplayData>) -> Self {
        Self {
            options,
            current: None,
            display,
        }
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    /// Handles one message at a time from either queue until both close.
    pub async fn run(
        mut self,
        mut snapshots: mpsc::Receiver<Snapshot>,
        mut actions: mpsc::Receiver<ViewAction>,
    ) {
        let mut snapshots_open = true;
        let mut actions_open = true;
        while snapshots_open || actions_open {
            tokio::select! {
                snapshot = snapshots.recv(), if snapshots_open => match snapshot {
                    Some(snapshot) => self.on_snapshot(snapshot),
                    None => snapshots_open = false,
                },
                action = actions.recv(), if actions_open => match action {
                    Some(action) => self.on_action(action),
                    None => actions_open = false,
                },
            }
        }
        debug!("view model stopped");
    }

    pub fn on_snapshot(&mut self, snapshot: Snapshot) {
        debug!(processes = snapshot.processes.len(), "snapshot received");
        self.current = Some(snapshot);
        self.rebuild();
    }

    pub fn on_action(&mut self, action: ViewAction) {
        let before = self.options;
        match action {
            ViewAction::SetSortKey(raw) => match raw.parse::<SortKey>() {
                Ok(key) => self.options.set_key(key),
                Err(err) => warn!(value = %raw, error = %err, "ignoring sort key"),
            },
            ViewAction::SetSortOrder(raw) => match raw.parse::<SortOrder>() {
                Ok(order) => self.options.set_order(order),
                Err(err) => warn!(value = %raw, error = %err, "ignoring sort order"),
            },
            ViewAction::NextSortKey => self.options.set_key(self.options.sort_key.next()),
            ViewAction::PreviousSortKey => {
                self.options.set_key(self.options.sort_key.previous())
            }
            ViewAction::ToggleSortOrder => {
                let order = self.options.sort_order.toggle();
                self.options.set_order(order);
            }
        }
        if self.options != before {
            info!(
                key = %self.options.sort_key,
                order = %self.options.sort_order,
                "view options changed"
            );
        }
        self.rebuild();
    }

    /// Publishes display data for the latest snapshot, if one has arrived.
    fn rebuild(&self) {
        let Some(snapshot) = &self.current else {
            return;
        };
        let data = DisplayData::build(snapshot, &self.options);
        self.display.publish(data);
    }
}
