use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hyprtask::config::Config;
use hyprtask::monitor::{Monitor, MonitorConfig, TerminationRequest, TrackingMode};
use hyprtask::pipeline::{Collaborators, Pipeline};
use hyprtask::publish::{self, Delivery};
use hyprtask::system::enumerator::{Enumerator, UserCache};
use hyprtask::system::kill::{KillResult, SignalKind, Signaller};
use hyprtask::system::platform::{CpuTotals, StaticProcess, StaticSource};
use hyprtask::system::process::WindowMetadata;
use hyprtask::system::sampler::Sampler;
use hyprtask::system::snapshot::Snapshot;
use hyprtask::view::{DisplayData, SortKey, SortOrder, ViewAction};
use hyprtask::window::{StaticWindows, WindowSource};
use tokio::sync::mpsc;
use tokio::time::timeout;

const SAMPLE: Duration = Duration::from_millis(100);
const WAIT: Duration = Duration::from_secs(5);

/// Records every signal and answers with a fixed outcome.
struct RecordingSignaller {
    calls: Mutex<Vec<(u32, SignalKind)>>,
    succeed: bool,
}

impl RecordingSignaller {
    fn new(succeed: bool) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            succeed,
        }
    }

    fn calls(&self) -> Vec<(u32, SignalKind)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Signaller for RecordingSignaller {
    fn signal(&self, pid: u32, kind: SignalKind) -> KillResult {
        self.calls.lock().unwrap().push((pid, kind));
        if self.succeed {
            KillResult::Success(pid, kind.name())
        } else {
            KillResult::Failed(pid, "operation not permitted".to_string())
        }
    }
}

fn window(workspace_id: i64, name: &str) -> WindowMetadata {
    WindowMetadata {
        workspace_id,
        workspace_name: name.to_string(),
        monitor: "DP-1".to_string(),
        title: format!("{name} window"),
        class: "kitty".to_string(),
    }
}

fn source() -> Arc<StaticSource> {
    let source = StaticSource::default();
    source.insert(10, StaticProcess::new("firefox", 1000).with_rss_pages(2048).with_ticks_per_read(2));
    source.insert(20, StaticProcess::new("kitty", 1000).with_rss_pages(512));
    source.insert(30, StaticProcess::new("sshd", 0).with_rss_pages(128));
    Arc::new(source)
}

struct Harness {
    monitor: Arc<Monitor>,
    snapshots: mpsc::Receiver<Snapshot>,
    windows: Arc<StaticWindows>,
}

fn harness(source: Arc<StaticSource>, mode: TrackingMode, snapshot_queue: usize) -> Harness {
    let users = Arc::new(UserCache::with_resolver(|uid| Some(format!("user{uid}"))));
    let enumerator = Enumerator::new(source.clone(), users, 4);
    let sampler = Arc::new(Sampler::new(source, SAMPLE).unwrap());
    let windows = Arc::new(StaticWindows::default());
    let window_source: Arc<dyn WindowSource> = windows.clone();
    let (publisher, snapshots) = publish::bounded(snapshot_queue, "snapshot");
    let config = MonitorConfig {
        poll_interval: Duration::from_millis(50),
        mode,
        quick_workers: 4,
    };
    let monitor = Arc::new(Monitor::new(
        config,
        enumerator,
        sampler,
        window_source,
        publisher,
    ));
    Harness {
        monitor,
        snapshots,
        windows,
    }
}

impl Harness {
    /// Runs one full poll and returns the quick and refined snapshots.
    async fn poll(&mut self) -> (Snapshot, Snapshot) {
        let refine = self.monitor.poll_once().await.expect("poll enumerated");
        let quick = self.snapshots.recv().await.unwrap();
        timeout(WAIT, refine).await.unwrap().unwrap();
        let refined = self.snapshots.recv().await.unwrap();
        (quick, refined)
    }
}

#[tokio::test]
async fn snapshot_pids_match_enumeration() {
    let mut h = harness(source(), TrackingMode::All, 8);
    let (quick, refined) = h.poll().await;
    assert_eq!(quick.pids(), vec![10, 20, 30]);
    assert_eq!(refined.pids(), vec![10, 20, 30]);

    let sshd = quick.get(30).unwrap();
    assert_eq!(sshd.identity.name, "sshd");
    assert_eq!(sshd.identity.user, "user0");
    assert_eq!(sshd.identity.command, "/usr/bin/sshd");
}

#[tokio::test]
async fn quick_snapshot_reports_zero_cpu_then_refines() {
    let mut h = harness(source(), TrackingMode::All, 8);
    let (quick, refined) = h.poll().await;

    for process in &quick.processes {
        assert_eq!(process.metrics.cpu, 0.0);
    }
    // 2048 pages * 4096 B out of 8 GiB.
    let mem = quick.get(10).unwrap().metrics.mem;
    assert!((mem - 0.09765625).abs() < 1e-9, "mem was {mem}");

    let firefox = refined.get(10).unwrap().metrics.cpu;
    assert!(firefox > 0.0 && firefox <= 100.0, "cpu was {firefox}");
    assert_eq!(refined.get(20).unwrap().metrics.cpu, 0.0);
}

#[tokio::test]
async fn quick_pass_keeps_last_measured_cpu() {
    let mut h = harness(source(), TrackingMode::All, 8);
    let (_, first_refined) = h.poll().await;
    let measured = first_refined.get(10).unwrap().metrics.cpu;
    assert!(measured > 0.0, "cpu was {measured}");

    let (quick, _) = h.poll().await;
    assert_eq!(quick.get(10).unwrap().metrics.cpu, measured);
}

#[tokio::test]
async fn vanished_processes_leave_the_table() {
    let source = source();
    let mut h = harness(source.clone(), TrackingMode::All, 8);
    h.poll().await;

    source.remove(20);
    source.insert(40, StaticProcess::new("htop", 1000));
    let (quick, _) = h.poll().await;
    assert_eq!(quick.pids(), vec![10, 30, 40]);
}

#[tokio::test]
async fn window_metadata_persists_until_overwritten() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.windows.set(HashMap::from([(10, window(1, "web"))]));
    let (quick, _) = h.poll().await;
    assert_eq!(quick.get(10).unwrap().workspace_id(), Some(1));
    assert!(quick.get(20).unwrap().window.is_none());

    h.windows.set(HashMap::new());
    let (quick, _) = h.poll().await;
    assert_eq!(quick.get(10).unwrap().workspace_id(), Some(1));

    h.windows.set(HashMap::from([(10, window(3, "media"))]));
    let (quick, _) = h.poll().await;
    let meta = quick.get(10).unwrap().window.as_ref().unwrap();
    assert_eq!(meta.workspace_name, "media");
}

#[tokio::test]
async fn unreachable_window_manager_is_not_fatal() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.windows.set(HashMap::from([(20, window(2, "term"))]));
    h.poll().await;

    h.windows.set_unreachable(true);
    let (quick, refined) = h.poll().await;
    assert_eq!(quick.pids(), vec![10, 20, 30]);
    assert_eq!(refined.get(20).unwrap().workspace_id(), Some(2));
}

#[tokio::test]
async fn unmatched_window_metadata_is_ignored() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.windows.set(HashMap::from([(999, window(1, "ghost"))]));
    let (quick, _) = h.poll().await;
    assert_eq!(quick.pids(), vec![10, 20, 30]);
    assert!(quick.processes.iter().all(|p| p.window.is_none()));
}

#[tokio::test]
async fn windowed_mode_tracks_only_window_owners() {
    let mut h = harness(source(), TrackingMode::Windowed, 8);
    h.windows.set(HashMap::from([
        (10, window(1, "web")),
        (30, window(2, "ops")),
    ]));
    let (quick, refined) = h.poll().await;
    assert_eq!(quick.pids(), vec![10, 30]);
    assert_eq!(refined.pids(), vec![10, 30]);

    h.windows.set(HashMap::from([(30, window(2, "ops"))]));
    let (quick, _) = h.poll().await;
    assert_eq!(quick.pids(), vec![30]);
}

#[tokio::test]
async fn system_cpu_comes_from_refined_snapshot() {
    let source = source();
    let mut h = harness(source.clone(), TrackingMode::All, 8);
    source.set_cpu_totals(CpuTotals::default());

    let refine = h.monitor.poll_once().await.unwrap();
    let quick = h.snapshots.recv().await.unwrap();
    assert_eq!(quick.system_cpu_percent, None);

    // Totals move while the sampling window is open.
    source.set_cpu_totals(CpuTotals {
        user: 30,
        idle: 60,
        iowait: 10,
        ..CpuTotals::default()
    });
    timeout(WAIT, refine).await.unwrap().unwrap();
    let refined = h.snapshots.recv().await.unwrap();
    let busy = refined.system_cpu_percent.unwrap();
    assert!((busy - 30.0).abs() < 1e-9, "busy was {busy}");
}

#[tokio::test]
async fn full_snapshot_queue_never_blocks_polling() {
    let mut h = harness(source(), TrackingMode::All, 1);
    for _ in 0..3 {
        let refine = timeout(WAIT, h.monitor.poll_once())
            .await
            .expect("poll blocked on a full queue")
            .unwrap();
        timeout(WAIT, refine).await.unwrap().unwrap();
    }
    // Only the first snapshot fit; the rest were dropped.
    assert!(h.snapshots.try_recv().is_ok());
    assert!(h.snapshots.try_recv().is_err());
}

#[tokio::test]
async fn successful_termination_removes_pid_and_publishes() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.poll().await;

    let recorder = Arc::new(RecordingSignaller::new(true));
    let signaller: Arc<dyn Signaller> = recorder.clone();
    let result = h
        .monitor
        .terminate(TerminationRequest::forced(20), &signaller)
        .await;

    assert!(result.is_success());
    assert_eq!(recorder.calls(), vec![(20, SignalKind::Forced)]);
    let published = h.snapshots.recv().await.unwrap();
    assert_eq!(published.pids(), vec![10, 30]);
}

#[tokio::test]
async fn failed_termination_leaves_table_unchanged() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.poll().await;

    let recorder = Arc::new(RecordingSignaller::new(false));
    let signaller: Arc<dyn Signaller> = recorder.clone();
    let result = h
        .monitor
        .terminate(TerminationRequest::graceful(20), &signaller)
        .await;

    assert!(matches!(result, KillResult::Failed(20, _)));
    assert_eq!(recorder.calls(), vec![(20, SignalKind::Graceful)]);
    assert!(h.snapshots.try_recv().is_err());
    let snapshot = h.monitor.table().snapshot().await.unwrap();
    assert_eq!(snapshot.pids(), vec![10, 20, 30]);
}

#[tokio::test]
async fn termination_consumer_serves_queued_requests_in_order() {
    let mut h = harness(source(), TrackingMode::All, 8);
    h.poll().await;

    let recorder = Arc::new(RecordingSignaller::new(true));
    let (requests, rx) = publish::bounded(4, "termination");
    let task = tokio::spawn(
        Arc::clone(&h.monitor).run_terminations(rx, recorder.clone() as Arc<dyn Signaller>),
    );

    assert_eq!(requests.publish(TerminationRequest::graceful(10)), Delivery::Sent);
    assert_eq!(requests.publish(TerminationRequest::forced(30)), Delivery::Sent);
    drop(requests);
    timeout(WAIT, task).await.unwrap().unwrap();

    assert_eq!(
        recorder.calls(),
        vec![(10, SignalKind::Graceful), (30, SignalKind::Forced)]
    );
    let snapshot = h.monitor.table().snapshot().await.unwrap();
    assert_eq!(snapshot.pids(), vec![20]);
}

#[tokio::test]
async fn refine_does_not_resurrect_terminated_pid() {
    let mut h = harness(source(), TrackingMode::All, 8);
    let refine = h.monitor.poll_once().await.unwrap();
    h.snapshots.recv().await.unwrap();

    let signaller: Arc<dyn Signaller> = Arc::new(RecordingSignaller::new(true));
    h.monitor
        .terminate(TerminationRequest::graceful(10), &signaller)
        .await;
    h.snapshots.recv().await.unwrap();

    timeout(WAIT, refine).await.unwrap().unwrap();
    let refined = h.snapshots.recv().await.unwrap();
    assert_eq!(refined.pids(), vec![20, 30]);
}

fn collaborators(signaller: Arc<dyn Signaller>) -> Collaborators {
    Collaborators {
        source: source(),
        windows: Arc::new(StaticWindows::new(HashMap::from([
            (10, window(1, "web")),
            (20, window(2, "term")),
        ]))),
        signaller,
        users: Arc::new(UserCache::with_resolver(|uid| Some(format!("user{uid}")))),
    }
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.general.refresh_rate_ms = 50;
    config.general.sample_interval_ms = 50;
    config
}

async fn next_display_matching(
    pipeline: &mut Pipeline,
    accept: impl Fn(&DisplayData) -> bool,
) -> DisplayData {
    timeout(WAIT, async {
        loop {
            let data = pipeline.display.recv().await.unwrap();
            if accept(&data) {
                return data;
            }
        }
    })
    .await
    .expect("no matching display data")
}

#[tokio::test]
async fn assembled_pipeline_publishes_grouped_display_data() {
    let signaller: Arc<dyn Signaller> = Arc::new(RecordingSignaller::new(true));
    let mut pipeline = Pipeline::build(&fast_config(), collaborators(signaller)).unwrap();
    pipeline.start_polling();

    let data = next_display_matching(&mut pipeline, |d| d.processes.len() == 3).await;
    assert_eq!(data.workspace_count(), 2);
    let names: Vec<&str> = data
        .workspaces
        .iter()
        .map(|w| w.workspace_name.as_str())
        .collect();
    assert_eq!(names, vec!["term", "web"]);

    pipeline
        .actions
        .publish(ViewAction::SetSortKey("pid".to_string()));
    pipeline
        .actions
        .publish(ViewAction::SetSortOrder("desc".to_string()));
    let sorted = next_display_matching(&mut pipeline, |d| {
        d.options.sort_key == SortKey::Pid && d.options.sort_order == SortOrder::Descending
    })
    .await;
    let pids: Vec<u32> = sorted.processes.iter().map(|p| p.pid()).collect();
    assert_eq!(pids, vec![30, 20, 10]);

    pipeline.shutdown();
}

#[tokio::test]
async fn assembled_pipeline_routes_termination_requests() {
    let recorder = Arc::new(RecordingSignaller::new(true));
    let mut pipeline =
        Pipeline::build(&fast_config(), collaborators(recorder.clone())).unwrap();
    pipeline.start_polling();
    next_display_matching(&mut pipeline, |d| d.processes.len() == 3).await;

    pipeline.terminations.publish(TerminationRequest::forced(30));
    timeout(WAIT, async {
        while recorder.calls().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("termination was not served");
    assert_eq!(recorder.calls(), vec![(30, SignalKind::Forced)]);

    pipeline.shutdown();
}

#[tokio::test]
async fn invalid_config_is_rejected_at_assembly() {
    let mut config = fast_config();
    config.general.mode = "everything".to_string();
    let signaller: Arc<dyn Signaller> = Arc::new(RecordingSignaller::new(true));
    assert!(Pipeline::build(&config, collaborators(signaller)).is_err());
}
