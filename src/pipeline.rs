use std::sync::Arc;

use color_eyre::eyre::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::monitor::{Monitor, TerminationRequest};
use crate::publish::{self, Publisher};
use crate::system::enumerator::{Enumerator, UserCache};
use crate::system::kill::Signaller;
use crate::system::platform::ProcessSource;
use crate::system::sampler::Sampler;
use crate::view::{DisplayData, ViewAction, ViewModel};
use crate::window::WindowSource;

/// External systems the pipeline reads from and signals into.
pub struct Collaborators {
    pub source: Arc<dyn ProcessSource>,
    pub windows: Arc<dyn WindowSource>,
    pub signaller: Arc<dyn Signaller>,
    pub users: Arc<UserCache>,
}

/// Running task manager plus the presentation-facing queue ends.
pub struct Pipeline {
    pub monitor: Arc<Monitor>,
    pub display: mpsc::Receiver<DisplayData>,
    pub actions: Publisher<ViewAction>,
    pub terminations: Publisher<TerminationRequest>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Wires every stage and starts the view model and termination consumer.
    /// Polling starts with [`Pipeline::start_polling`].
    pub fn build(config: &Config, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let p = &config.pipeline;

        let sampler = Arc::new(Sampler::new(
            Arc::clone(&collaborators.source),
            config.sample_interval(),
        )?);
        let enumerator = Enumerator::new(
            Arc::clone(&collaborators.source),
            collaborators.users,
            p.enumerator_workers,
        );

        let (snapshots, snapshot_rx) = publish::bounded(p.snapshot_queue, "snapshot");
        let (display, display_rx) = publish::bounded(p.display_queue, "display");
        let (actions, action_rx) = publish::bounded(p.action_queue, "view-action");
        let (terminations, termination_rx) = publish::bounded(p.termination_queue, "termination");

        let monitor = Arc::new(Monitor::new(
            config.monitor_config()?,
            enumerator,
            sampler,
            collaborators.windows,
            snapshots,
        ));
        let view = ViewModel::new(config.view_options(), display);

        let tasks = vec![
            tokio::spawn(view.run(snapshot_rx, action_rx)),
            tokio::spawn(
                Arc::clone(&monitor).run_terminations(termination_rx, collaborators.signaller),
            ),
        ];

        info!(
            refresh_ms = config.general.refresh_rate_ms,
            sample_ms = config.general.sample_interval_ms,
            mode = %config.general.mode,
            "pipeline assembled"
        );

        Ok(Self {
            monitor,
            display: display_rx,
            actions,
            terminations,
            tasks,
        })
    }

    pub fn start_polling(&mut self) {
        self.tasks.push(tokio::spawn(Arc::clone(&self.monitor).run()));
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}
