//! Integration tests for the profiling coordinator
//!
//! The coordinator is driven through the action registry against the
//! in-process Profiler and HeapProfiler domains. Time is paused so timeouts
//! and the snapshot grace period elapse deterministically.

use async_trait::async_trait;
use cdp_types::domains::heap_profiler;
use cdp_types::{CdpError, CdpEvent};
use inspector_session::{EventBus, EventSubscription, InspectorSession, LocalInspector};
use parking_lot::Mutex;
use profiler_domains::in_process_inspector_with_chunk_size;
use profiling_coordinator::{
    ack_callback, Ack, AckCallback, ActionService, Artifact, ArtifactKind, ChannelSink,
    Collaborators, CoordinatorConfig, CoordinatorError, FeatureFlags, ProfileKind,
    ProfilingCoordinator, ACTION_NAMES, CPU_PROFILING_START, CPU_PROFILING_STOP, HEAPDUMP,
    HEAP_PROFILING_START, HEAP_PROFILING_STOP,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{sleep, Instant};
use tokio_test::assert_ok;

type Log = Arc<Mutex<Vec<String>>>;

/// Inspector wrapper recording every posted method in a shared log
struct RecordingInspector {
    inner: Arc<LocalInspector>,
    log: Log,
}

#[async_trait]
impl InspectorSession for RecordingInspector {
    async fn post(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        self.log.lock().push(method.to_string());
        self.inner.post(method, params).await
    }

    fn subscribe(&self, events: &[&str]) -> EventSubscription {
        self.inner.subscribe(events)
    }
}

/// Inspector that goes away after streaming the first snapshot chunk
struct ClosingInspector {
    bus: EventBus,
}

#[async_trait]
impl InspectorSession for ClosingInspector {
    async fn post(&self, method: &str, _params: Option<Value>) -> Result<Value, CdpError> {
        if method == heap_profiler::TAKE_HEAP_SNAPSHOT {
            self.bus.emitter().emit(CdpEvent::new(
                heap_profiler::ADD_HEAP_SNAPSHOT_CHUNK,
                json!({ "chunk": "{\"snapshot\":" }),
            ));
            self.bus.close();
        }
        Ok(json!({}))
    }

    fn subscribe(&self, events: &[&str]) -> EventSubscription {
        self.bus.subscribe(events)
    }
}

/// Inspector replaying one scripted event stream per snapshot request
///
/// An empty script leaves the capture waiting with the session still open.
struct ScriptedInspector {
    bus: EventBus,
    scripts: Mutex<VecDeque<Vec<CdpEvent>>>,
    snapshots: AtomicUsize,
}

impl ScriptedInspector {
    fn new(scripts: Vec<Vec<CdpEvent>>) -> Arc<Self> {
        Arc::new(Self {
            bus: EventBus::new(),
            scripts: Mutex::new(scripts.into()),
            snapshots: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl InspectorSession for ScriptedInspector {
    async fn post(&self, method: &str, _params: Option<Value>) -> Result<Value, CdpError> {
        if method == heap_profiler::TAKE_HEAP_SNAPSHOT {
            self.snapshots.fetch_add(1, Ordering::SeqCst);
            let script = self.scripts.lock().pop_front().unwrap_or_default();
            let emitter = self.bus.emitter();
            for event in script {
                emitter.emit(event);
            }
        }
        Ok(json!({}))
    }

    fn subscribe(&self, events: &[&str]) -> EventSubscription {
        self.bus.subscribe(events)
    }
}

fn snapshot_chunk(text: &str) -> CdpEvent {
    CdpEvent::new(heap_profiler::ADD_HEAP_SNAPSHOT_CHUNK, json!({ "chunk": text }))
}

fn snapshot_progress(params: Value) -> CdpEvent {
    CdpEvent::new(heap_profiler::REPORT_HEAP_SNAPSHOT_PROGRESS, params)
}

async fn scripted_coordinator(
    inspector: Arc<ScriptedInspector>,
    config: CoordinatorConfig,
) -> (Arc<ProfilingCoordinator>, UnboundedReceiver<(String, Artifact)>) {
    let (sink, artifacts) = ChannelSink::new();
    let coordinator = ProfilingCoordinator::init(
        Collaborators::new().inspector(inspector).sink(Arc::new(sink)),
        config,
    )
    .await;
    (coordinator, artifacts)
}

struct Harness {
    coordinator: Arc<ProfilingCoordinator>,
    actions: Arc<ActionService>,
    artifacts: UnboundedReceiver<(String, Artifact)>,
    log: Log,
}

impl Harness {
    async fn new() -> Self {
        Self::with_config(CoordinatorConfig::default()).await
    }

    async fn with_config(config: CoordinatorConfig) -> Self {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let inspector = Arc::new(RecordingInspector {
            inner: in_process_inspector_with_chunk_size(32),
            log: log.clone(),
        });
        let actions = Arc::new(ActionService::new());
        let (sink, artifacts) = ChannelSink::new();

        let coordinator = ProfilingCoordinator::init(
            Collaborators::new()
                .inspector(inspector)
                .registry(actions.clone())
                .sink(Arc::new(sink)),
            config,
        )
        .await;

        Self {
            coordinator,
            actions,
            artifacts,
            log,
        }
    }

    /// Callback recording acks, also marking them in the command log
    fn recorder(&self) -> (AckCallback, Arc<Mutex<Vec<Ack>>>) {
        let acks = Arc::new(Mutex::new(Vec::new()));
        let (log, seen) = (self.log.clone(), acks.clone());
        let callback = ack_callback(move |ack| {
            log.lock().push("ack".to_string());
            seen.lock().push(ack);
        });
        (callback, acks)
    }

    fn invoke(&self, name: &str, options: Option<Value>) -> Arc<Mutex<Vec<Ack>>> {
        let (callback, acks) = self.recorder();
        assert!(self.actions.invoke(name, options, callback));
        acks
    }

    fn posted(&self, method: &str) -> usize {
        self.log.lock().iter().filter(|m| *m == method).count()
    }

    async fn next_artifact(&mut self) -> (String, Artifact) {
        self.artifacts.recv().await.expect("artifact channel closed")
    }

    /// Let queued commands and spawned tasks run
    async fn settle(&self) {
        sleep(Duration::from_millis(10)).await;
    }
}

fn single(acks: &Arc<Mutex<Vec<Ack>>>) -> Ack {
    let acks = acks.lock();
    assert_eq!(acks.len(), 1, "expected exactly one ack, got {:?}", *acks);
    acks[0].clone()
}

#[tokio::test(start_paused = true)]
async fn test_init_registers_actions_and_enables_features() {
    let harness = Harness::new().await;

    let mut expected: Vec<String> = ACTION_NAMES.iter().map(|n| n.to_string()).collect();
    expected.sort();
    assert_eq!(harness.actions.action_names(), expected);

    assert!(harness.coordinator.is_enabled());
    assert_eq!(harness.coordinator.feature_flags(), FeatureFlags::all(true));
    assert_eq!(harness.posted("Profiler.enable"), 1);
    assert_eq!(harness.posted("HeapProfiler.enable"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cpu_profile_start_stop_delivers_artifact() {
    let mut harness = Harness::new().await;

    let started = single(&harness.invoke(CPU_PROFILING_START, Some(json!({}))));
    assert!(started.success);
    let id = started.id.expect("start ack carries the session id");

    sleep(Duration::from_millis(250)).await;
    let stopped = single(&harness.invoke(CPU_PROFILING_STOP, None));
    assert_eq!(stopped, Ack::ok());

    let (channel, artifact) = harness.next_artifact().await;
    assert_eq!(channel, "profilings");
    let Artifact::Profile(profile) = artifact else {
        panic!("expected a profile artifact");
    };
    assert_eq!(profile.id.to_string(), id);
    assert_eq!(profile.kind, ArtifactKind::CpuProfile);
    assert_eq!(profile.origin, "manual");
    assert!(profile.success);
    assert!(profile.duration_ms >= 250);

    let parsed: Value = assert_ok!(serde_json::from_str(&profile.data));
    assert!(parsed["nodes"].is_array());
    assert!(harness.coordinator.current_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_second_start_is_rejected() {
    let harness = Harness::new().await;

    let first = single(&harness.invoke(CPU_PROFILING_START, None));
    let second = single(&harness.invoke(HEAP_PROFILING_START, None));

    assert!(first.success);
    assert!(!second.success);
    assert_eq!(second.err.as_deref(), Some("A profiling is already running"));

    let session = harness.coordinator.current_session().unwrap();
    assert_eq!(session.kind(), ProfileKind::Cpu);
    assert_eq!(Some(session.id().to_string()), first.id);

    harness.settle().await;
    assert_eq!(harness.posted("HeapProfiler.startSampling"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_session_never_posts() {
    let mut harness = Harness::new().await;

    let ack = single(&harness.invoke(CPU_PROFILING_STOP, None));
    assert!(!ack.success);
    assert_eq!(ack.err.as_deref(), Some("No profiling are already running"));

    harness.settle().await;
    assert_eq!(harness.posted("Profiler.stop"), 0);
    assert!(harness.artifacts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stop_of_other_kind_leaves_session_running() {
    let harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, None);
    let ack = single(&harness.invoke(HEAP_PROFILING_STOP, None));

    assert_eq!(
        ack.err.as_deref(),
        Some(CoordinatorError::NotRunning.to_string().as_str())
    );
    assert!(harness.coordinator.current_session().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_stop_delivers_once() {
    let mut harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, None);
    let first = single(&harness.invoke(CPU_PROFILING_STOP, None));
    let second = single(&harness.invoke(CPU_PROFILING_STOP, None));
    assert!(first.success);
    assert!(!second.success);

    harness.next_artifact().await;
    harness.settle().await;
    assert!(harness.artifacts.try_recv().is_err());
    assert_eq!(harness.posted("Profiler.stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ack_precedes_protocol_command() {
    let harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, None);
    harness.settle().await;

    let log = harness.log.lock().clone();
    let ack = log.iter().position(|m| m == "ack").unwrap();
    let start = log.iter().position(|m| m == "Profiler.start").unwrap();
    assert!(ack < start, "ack must precede Profiler.start: {:?}", log);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_stops_session() {
    let mut harness = Harness::new().await;
    let begin = Instant::now();

    let ack = single(&harness.invoke(
        CPU_PROFILING_START,
        Some(json!({ "timeout": 500, "origin": "alert" })),
    ));

    let (_, artifact) = harness.next_artifact().await;
    assert!(begin.elapsed() >= Duration::from_millis(500));

    let Artifact::Profile(profile) = artifact else {
        panic!("expected a profile artifact");
    };
    assert_eq!(Some(profile.id.to_string()), ack.id);
    assert_eq!(profile.origin, "alert");
    assert!(profile.duration_ms >= 500);

    assert!(harness.coordinator.current_session().is_none());
    sleep(Duration::from_secs(2)).await;
    assert!(harness.artifacts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_stop_before_timeout_delivers_once() {
    let mut harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, Some(json!({ "timeout": 1000 })));
    sleep(Duration::from_millis(100)).await;
    harness.invoke(CPU_PROFILING_STOP, None);

    harness.next_artifact().await;
    sleep(Duration::from_secs(2)).await;

    assert!(harness.artifacts.try_recv().is_err());
    assert_eq!(harness.posted("Profiler.stop"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_timer_spares_newer_session() {
    let mut harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, Some(json!({ "timeout": 1000 })));
    harness.invoke(CPU_PROFILING_STOP, None);
    harness.next_artifact().await;

    let newer = single(&harness.invoke(CPU_PROFILING_START, None));
    sleep(Duration::from_millis(1500)).await;

    let session = harness.coordinator.current_session().unwrap();
    assert_eq!(Some(session.id().to_string()), newer.id);
    assert!(harness.artifacts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_heap_sampling_uses_interval() {
    let mut harness = Harness::new().await;

    harness.invoke(HEAP_PROFILING_START, Some(json!({ "samplingInterval": 2048 })));
    harness.invoke(HEAP_PROFILING_STOP, None);

    let (_, artifact) = harness.next_artifact().await;
    assert_eq!(artifact.kind(), ArtifactKind::HeapProfile);

    let json = artifact.to_json().unwrap();
    assert_eq!(json["heapprofile"], true);
    assert_eq!(json["type"], "heapprofile");

    let profile: Value = serde_json::from_str(artifact.data()).unwrap();
    assert_eq!(profile["samples"][0]["size"], 2048);
}

#[tokio::test(start_paused = true)]
async fn test_heap_sampling_default_interval() {
    let config = CoordinatorConfig::builder()
        .default_sampling_interval(4096)
        .build();
    let mut harness = Harness::with_config(config).await;

    harness.invoke(HEAP_PROFILING_START, Some(json!({ "samplingInterval": 0 })));
    harness.invoke(HEAP_PROFILING_STOP, None);

    let (_, artifact) = harness.next_artifact().await;
    let profile: Value = serde_json::from_str(artifact.data()).unwrap();
    assert_eq!(profile["samples"][0]["size"], 4096);
}

#[tokio::test(start_paused = true)]
async fn test_heapdump_acks_then_delivers_after_grace_period() {
    let mut harness = Harness::new().await;
    let begin = Instant::now();

    let acks = harness.invoke(HEAPDUMP, Some(json!({ "origin": "alert" })));
    assert_eq!(single(&acks), Ack::ok());
    assert_eq!(harness.posted(heap_profiler::TAKE_HEAP_SNAPSHOT), 0);

    let (channel, artifact) = harness.next_artifact().await;
    assert!(begin.elapsed() >= Duration::from_millis(200));
    assert_eq!(channel, "profilings");

    let Artifact::Heapdump(dump) = artifact else {
        panic!("expected a heapdump artifact");
    };
    assert_eq!(dump.origin, "alert");
    let snapshot: Value = assert_ok!(serde_json::from_str(&dump.data));
    assert!(snapshot.is_object());

    // no session is occupied by a heapdump
    assert!(harness.coordinator.current_session().is_none());
    assert_eq!(acks.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_heapdump_without_options() {
    let mut harness = Harness::new().await;

    let acks = harness.invoke(HEAPDUMP, None);
    let (_, artifact) = harness.next_artifact().await;

    assert_eq!(single(&acks), Ack::ok());
    let json = artifact.to_json().unwrap();
    assert_eq!(json["initiated"], "manual");
    assert_eq!(json["type"], "heapdump");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_heapdumps_do_not_interleave() {
    let mut harness = Harness::new().await;

    harness.invoke(HEAPDUMP, None);
    harness.invoke(HEAPDUMP, None);

    let (_, first) = harness.next_artifact().await;
    let (_, second) = harness.next_artifact().await;
    let first: Value = assert_ok!(serde_json::from_str(first.data()));
    let second: Value = assert_ok!(serde_json::from_str(second.data()));
    assert_eq!(first["nodes"][2], 3);
    assert_eq!(second["nodes"][2], 5);
}

#[tokio::test(start_paused = true)]
async fn test_heapdump_interrupted_reports_second_failure() {
    let inspector = Arc::new(ClosingInspector {
        bus: EventBus::new(),
    });
    let (sink, mut artifacts) = ChannelSink::new();
    let coordinator = ProfilingCoordinator::init(
        Collaborators::new().inspector(inspector).sink(Arc::new(sink)),
        CoordinatorConfig::default(),
    )
    .await;

    let acks = Arc::new(Mutex::new(Vec::new()));
    let seen = acks.clone();
    coordinator.take_heapdump(None, ack_callback(move |ack| seen.lock().push(ack)));

    sleep(Duration::from_secs(1)).await;

    let acks = acks.lock();
    assert_eq!(acks.len(), 2);
    assert!(acks[0].success);
    assert!(!acks[1].success);
    assert_eq!(
        acks[1].err,
        Some(CoordinatorError::SnapshotInterrupted.to_string())
    );
    assert!(artifacts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_missing_inspector_disables_coordinator() {
    let actions = Arc::new(ActionService::new());
    let (sink, _artifacts) = ChannelSink::new();

    let coordinator = ProfilingCoordinator::init(
        Collaborators::new()
            .registry(actions.clone())
            .sink(Arc::new(sink)),
        CoordinatorConfig::default(),
    )
    .await;

    assert!(!coordinator.is_enabled());
    assert_eq!(coordinator.feature_flags(), FeatureFlags::all(false));
    assert!(actions.action_names().is_empty());

    let acks = Arc::new(Mutex::new(Vec::new()));
    let seen = acks.clone();
    let callback = ack_callback(move |ack| seen.lock().push(ack));
    coordinator.start_cpu_profile(None, callback.clone());
    coordinator.take_heapdump(None, callback);

    for ack in acks.lock().iter() {
        assert_eq!(ack.err.as_deref(), Some("Profiler not available"));
    }
    assert_eq!(acks.lock().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_missing_registry_keeps_coordinator_enabled() {
    let (sink, mut artifacts) = ChannelSink::new();
    let coordinator = ProfilingCoordinator::init(
        Collaborators::new()
            .inspector(in_process_inspector_with_chunk_size(64))
            .sink(Arc::new(sink)),
        CoordinatorConfig::default(),
    )
    .await;

    assert!(coordinator.is_enabled());
    coordinator.start_cpu_profile(None, ack_callback(|ack| assert!(ack.success)));
    coordinator.stop_cpu_profile(ack_callback(|ack| assert!(ack.success)));

    let (_, artifact) = artifacts.recv().await.unwrap();
    assert_eq!(artifact.kind(), ArtifactKind::CpuProfile);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_registration_fails() {
    let harness = Harness::new().await;

    let result = harness.coordinator.register(harness.actions.as_ref());
    assert!(matches!(result, Err(CoordinatorError::Registration(_))));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_disables_domains_and_rejects_operations() {
    let mut harness = Harness::new().await;

    harness.invoke(CPU_PROFILING_START, None);
    let mut flags = harness.coordinator.subscribe_feature_flags();
    assert_eq!(*flags.borrow_and_update(), FeatureFlags::all(true));

    harness.coordinator.shutdown().await;
    assert_eq!(harness.posted("Profiler.disable"), 1);
    assert_eq!(harness.posted("HeapProfiler.disable"), 1);
    assert!(!harness.coordinator.is_enabled());

    let start = single(&harness.invoke(HEAP_PROFILING_START, None));
    assert_eq!(start.err.as_deref(), Some("Profiler not available"));
    let heapdump = single(&harness.invoke(HEAPDUMP, None));
    assert_eq!(heapdump.err.as_deref(), Some("Profiler not available"));

    harness.settle().await;
    assert!(harness.artifacts.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_heap_sampling_timeout_delivers_once() {
    let mut harness = Harness::new().await;
    let begin = Instant::now();

    let ack = single(&harness.invoke(HEAP_PROFILING_START, Some(json!({ "timeout": 800 }))));
    assert!(ack.success);

    let (_, artifact) = harness.next_artifact().await;
    assert!(begin.elapsed() >= Duration::from_millis(800));
    let Artifact::Profile(profile) = artifact else {
        panic!("expected a profile artifact");
    };
    assert_eq!(profile.kind, ArtifactKind::HeapProfile);
    assert_eq!(Some(profile.id.to_string()), ack.id);

    sleep(Duration::from_secs(2)).await;
    assert!(harness.artifacts.try_recv().is_err());
    assert_eq!(harness.posted("HeapProfiler.stopSampling"), 1);
    assert!(harness.coordinator.current_session().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_heapdump_ignores_progress_without_counts() {
    let inspector = ScriptedInspector::new(vec![vec![
        snapshot_chunk("{\"a\":"),
        snapshot_progress(json!({ "done": 1 })),
        snapshot_chunk("1}"),
        snapshot_progress(json!({ "finished": true })),
    ]]);
    let (coordinator, mut artifacts) =
        scripted_coordinator(inspector, CoordinatorConfig::default()).await;

    let acks = Arc::new(Mutex::new(Vec::new()));
    let seen = acks.clone();
    coordinator.take_heapdump(None, ack_callback(move |ack| seen.lock().push(ack)));

    let (_, artifact) = artifacts.recv().await.unwrap();
    assert_eq!(artifact.data(), "{\"a\":1}");
    assert_eq!(*acks.lock(), vec![Ack::ok()]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_capture_does_not_block_next_heapdump() {
    let inspector = ScriptedInspector::new(vec![
        vec![],
        vec![
            snapshot_chunk("{}"),
            snapshot_progress(json!({ "done": 1, "total": 1, "finished": true })),
        ],
    ]);
    let config = CoordinatorConfig::builder().snapshot_timeout_ms(5_000).build();
    let (coordinator, mut artifacts) = scripted_coordinator(inspector.clone(), config).await;

    let acks = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let seen = acks.clone();
        coordinator.take_heapdump(None, ack_callback(move |ack| seen.lock().push(ack)));
    }

    sleep(Duration::from_secs(60)).await;

    let (_, artifact) = artifacts.try_recv().expect("second heapdump delivered");
    assert_eq!(artifact.data(), "{}");
    assert!(artifacts.try_recv().is_err());
    assert_eq!(inspector.snapshots.load(Ordering::SeqCst), 2);

    let acks = acks.lock();
    assert_eq!(acks.len(), 3);
    assert_eq!(acks.iter().filter(|ack| ack.success).count(), 2);
    let failure = acks.iter().find(|ack| !ack.success).unwrap();
    assert_eq!(
        failure.err,
        Some(CoordinatorError::SnapshotTimeout(5_000).to_string())
    );
}
