//! Profiling session coordinator
//!
//! Drives the inspector's Profiler and HeapProfiler domains on behalf of
//! remote actions. Every operation acknowledges its caller before any
//! protocol command is issued, and each finished session yields exactly one
//! artifact on the sink.

use crate::ack::{noop_callback, Ack, AckCallback};
use crate::artifact::{Artifact, ArtifactSink, HeapdumpArtifact, ProfileArtifact};
use crate::commands::CommandQueue;
use crate::config::{CoordinatorConfig, FeatureFlags};
use crate::error::{CoordinatorError, Result};
use crate::options::ActionOptions;
use crate::reassembler::capture_heap_snapshot;
use crate::registry::{
    ActionHandler, ActionRegistry, CPU_PROFILING_START, CPU_PROFILING_STOP, HEAPDUMP,
    HEAP_PROFILING_START, HEAP_PROFILING_STOP,
};
use crate::session::{ActiveSession, ProfileKind, SessionId, SessionSlot};
use cdp_types::domains::{heap_profiler, profiler};
use cdp_types::CdpError;
use inspector_session::InspectorSession;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// External collaborators handed to [`ProfilingCoordinator::init`]
///
/// A missing inspector or sink yields a disabled coordinator. A missing
/// registry only means no action is registered.
#[derive(Clone, Default)]
pub struct Collaborators {
    /// Inspector session to drive
    pub inspector: Option<Arc<dyn InspectorSession>>,
    /// Registry the five actions are registered with
    pub registry: Option<Arc<dyn ActionRegistry>>,
    /// Destination of finished artifacts
    pub sink: Option<Arc<dyn ArtifactSink>>,
}

impl Collaborators {
    /// No collaborators
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inspector session
    pub fn inspector(mut self, inspector: Arc<dyn InspectorSession>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    /// Set the action registry
    pub fn registry(mut self, registry: Arc<dyn ActionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the artifact sink
    pub fn sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

#[derive(Clone)]
struct Backend {
    inspector: Arc<dyn InspectorSession>,
    sink: Arc<dyn ArtifactSink>,
    commands: CommandQueue,
    runtime: Handle,
}

/// Coordinator of CPU profiling, heap sampling and heap snapshots
///
/// # Example
///
/// ```no_run
/// use profiling_coordinator::{
///     ack_callback, ActionService, ChannelSink, Collaborators, CoordinatorConfig,
///     ProfilingCoordinator,
/// };
/// use std::sync::Arc;
///
/// # async fn run(inspector: Arc<dyn inspector_session::InspectorSession>) {
/// let actions = Arc::new(ActionService::new());
/// let (sink, mut artifacts) = ChannelSink::new();
///
/// let coordinator = ProfilingCoordinator::init(
///     Collaborators::new()
///         .inspector(inspector)
///         .registry(actions.clone())
///         .sink(Arc::new(sink)),
///     CoordinatorConfig::default(),
/// )
/// .await;
///
/// actions.invoke("heapdump", None, ack_callback(|ack| println!("{:?}", ack)));
/// let (_channel, artifact) = artifacts.recv().await.unwrap();
/// # let _ = (coordinator, artifact);
/// # }
/// ```
pub struct ProfilingCoordinator {
    config: CoordinatorConfig,
    /// `None` is the permanently disabled variant
    backend: Option<Backend>,
    session: SessionSlot,
    /// Serializes snapshot captures so chunk streams never interleave;
    /// each hold is bounded by the snapshot timeout
    snapshot_lock: AsyncMutex<()>,
    flags: watch::Sender<FeatureFlags>,
    shut_down: AtomicBool,
}

impl ProfilingCoordinator {
    /// Initialize the coordinator
    ///
    /// Enables the Profiler and HeapProfiler domains, turns the feature
    /// flags on and registers the five actions. Without an inspector or a
    /// sink the coordinator is returned disabled with its flags off.
    pub async fn init(collaborators: Collaborators, config: CoordinatorConfig) -> Arc<Self> {
        let Collaborators {
            inspector,
            registry,
            sink,
        } = collaborators;

        let backend = match (inspector, sink) {
            (Some(inspector), Some(sink)) => {
                let runtime = Handle::current();
                let commands = CommandQueue::spawn(inspector.clone(), &runtime);
                Some(Backend {
                    inspector,
                    sink,
                    commands,
                    runtime,
                })
            }
            (None, _) => {
                error!("Failed to acquire the inspector session, disabling profiling");
                None
            }
            (Some(_), None) => {
                error!("No artifact sink available, disabling profiling");
                None
            }
        };

        let coordinator = Arc::new(Self::with_backend(config, backend));
        let Some(backend) = coordinator.backend.as_ref() else {
            coordinator.disable();
            return coordinator;
        };

        for domain in [profiler::DOMAIN, heap_profiler::DOMAIN] {
            if let Err(e) = backend.inspector.enable_domain(domain).await {
                warn!("Failed to enable the {} domain: {}", domain, e);
            }
        }
        coordinator.flags.send_replace(FeatureFlags::all(true));

        match registry {
            Some(registry) => {
                // failures are logged per action
                let _ = coordinator.register(registry.as_ref());
            }
            None => warn!("No action registry available, profiling actions are unreachable"),
        }

        info!("Profiling coordinator ready");
        coordinator
    }

    /// Build a coordinator that rejects every operation
    pub fn disabled(config: CoordinatorConfig) -> Arc<Self> {
        let coordinator = Arc::new(Self::with_backend(config, None));
        coordinator.disable();
        coordinator
    }

    fn with_backend(config: CoordinatorConfig, backend: Option<Backend>) -> Self {
        let (flags, _) = watch::channel(FeatureFlags::default());
        Self {
            config,
            backend,
            session: SessionSlot::new(),
            snapshot_lock: AsyncMutex::new(()),
            flags,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Turn every feature flag off; repeated calls are no-ops
    fn disable(&self) {
        let off = FeatureFlags::all(false);
        let changed = self.flags.send_if_modified(|flags| {
            let changed = *flags != off;
            *flags = off;
            changed
        });
        debug!("Profiling features disabled (changed: {})", changed);
    }

    /// Register the five actions with `registry`
    ///
    /// Every action is attempted; the first failure is returned.
    pub fn register(self: &Arc<Self>, registry: &dyn ActionRegistry) -> Result<()> {
        let actions: [(&str, ActionHandler); 5] = [
            (
                HEAPDUMP,
                self.action(|c, options, cb| c.take_heapdump(options, cb)),
            ),
            (
                CPU_PROFILING_START,
                self.action(|c, options, cb| c.start_cpu_profile(options, cb)),
            ),
            (
                CPU_PROFILING_STOP,
                self.action(|c, _, cb| c.stop_cpu_profile(cb)),
            ),
            (
                HEAP_PROFILING_START,
                self.action(|c, options, cb| c.start_heap_sampling(options, cb)),
            ),
            (
                HEAP_PROFILING_STOP,
                self.action(|c, _, cb| c.stop_heap_sampling(cb)),
            ),
        ];

        let mut outcome = Ok(());
        for (name, handler) in actions {
            if let Err(e) = registry.register_action(name, handler) {
                warn!("Failed to register action {}: {}", name, e);
                if outcome.is_ok() {
                    outcome = Err(e);
                }
            }
        }
        outcome
    }

    fn action<F>(self: &Arc<Self>, f: F) -> ActionHandler
    where
        F: Fn(&Arc<Self>, Option<Value>, AckCallback) + Send + Sync + 'static,
    {
        let coordinator = Arc::downgrade(self);
        Arc::new(move |options: Option<Value>, callback: AckCallback| {
            match coordinator.upgrade() {
                Some(coordinator) => f(&coordinator, options, callback),
                None => callback(Ack::failure(&CoordinatorError::ProfilerNotAvailable)),
            }
        })
    }

    /// Whether operations can reach the inspector
    pub fn is_enabled(&self) -> bool {
        self.backend().is_some()
    }

    /// Current feature flags
    pub fn feature_flags(&self) -> FeatureFlags {
        *self.flags.borrow()
    }

    /// Watch feature flag changes
    pub fn subscribe_feature_flags(&self) -> watch::Receiver<FeatureFlags> {
        self.flags.subscribe()
    }

    /// The active CPU or heap-sampling session, if any
    pub fn current_session(&self) -> Option<ActiveSession> {
        self.session.current()
    }

    /// Coordinator configuration
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    fn backend(&self) -> Option<&Backend> {
        if self.shut_down.load(Ordering::SeqCst) {
            return None;
        }
        self.backend.as_ref()
    }

    /// Start a CPU profiling session
    pub fn start_cpu_profile(self: &Arc<Self>, options: Option<Value>, callback: AckCallback) {
        self.start_session(ProfileKind::Cpu, options, callback);
    }

    /// Stop the CPU profiling session and deliver its profile
    pub fn stop_cpu_profile(self: &Arc<Self>, callback: AckCallback) {
        self.stop_session(ProfileKind::Cpu, None, callback);
    }

    /// Start a heap sampling session
    pub fn start_heap_sampling(self: &Arc<Self>, options: Option<Value>, callback: AckCallback) {
        self.start_session(ProfileKind::HeapSampling, options, callback);
    }

    /// Stop the heap sampling session and deliver its profile
    pub fn stop_heap_sampling(self: &Arc<Self>, callback: AckCallback) {
        self.stop_session(ProfileKind::HeapSampling, None, callback);
    }

    fn start_session(
        self: &Arc<Self>,
        kind: ProfileKind,
        options: Option<Value>,
        callback: AckCallback,
    ) {
        let options = ActionOptions::from_value(options.as_ref());

        let Some(backend) = self.backend() else {
            callback(Ack::failure(&CoordinatorError::ProfilerNotAvailable));
            return;
        };

        let origin = options
            .origin
            .clone()
            .unwrap_or_else(|| self.config.default_origin().to_string());
        let session = match self.session.try_begin(kind, origin) {
            Ok(session) => session,
            Err(e) => {
                debug!("Rejected {:?} start: {}", kind, e);
                callback(Ack::failure(&e));
                return;
            }
        };
        info!(
            "Started {:?} session {} (origin: {})",
            kind,
            session.id(),
            session.origin()
        );

        callback(Ack::started(session.id()));

        match kind {
            ProfileKind::Cpu => backend.commands.post(profiler::START, None),
            ProfileKind::HeapSampling => {
                let interval = options
                    .sampling_interval
                    .unwrap_or_else(|| self.config.default_sampling_interval());
                backend.commands.post(
                    heap_profiler::START_SAMPLING,
                    Some(json!({ "samplingInterval": interval })),
                );
            }
        }

        if let Some(timeout) = options.timeout {
            let coordinator = Arc::downgrade(self);
            let id = session.id();
            debug!("Session {} will stop after {:?}", id, timeout);
            backend.runtime.spawn(async move {
                tokio::time::sleep(timeout).await;
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.stop_session(kind, Some(id), noop_callback());
                }
            });
        }
    }

    /// Stop the session of `kind`, or only session `only` when given
    fn stop_session(
        self: &Arc<Self>,
        kind: ProfileKind,
        only: Option<SessionId>,
        callback: AckCallback,
    ) {
        let Some(backend) = self.backend() else {
            let error = if self.session.is_active(kind) {
                CoordinatorError::ProfilerNotAvailable
            } else {
                CoordinatorError::NotRunning
            };
            callback(Ack::failure(&error));
            return;
        };

        let taken = match only {
            Some(id) => self
                .session
                .take_matching(id)
                .ok_or(CoordinatorError::NotRunning),
            None => self.session.take(kind),
        };
        let session = match taken {
            Ok(session) => session,
            Err(e) => {
                debug!("Rejected {:?} stop: {}", kind, e);
                callback(Ack::failure(&e));
                return;
            }
        };
        info!("Stopping {:?} session {}", kind, session.id());

        callback(Ack::ok());

        let result = backend.commands.request(kind.stop_method(), None);
        let sink = backend.sink.clone();
        let channel = self.config.artifact_channel().to_string();
        let coordinator = Arc::downgrade(self);

        backend.runtime.spawn(async move {
            let data = result.await.and_then(|value| serialize_profile(&value));

            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if coordinator.shut_down.load(Ordering::SeqCst) {
                debug!("Discarding profile of session {} after shutdown", session.id());
                return;
            }

            match data {
                Ok(data) => {
                    let artifact = ProfileArtifact::from_session(&session, data);
                    info!(
                        "Delivering {} of session {} ({} ms)",
                        artifact.kind.as_str(),
                        artifact.id,
                        artifact.duration_ms
                    );
                    sink.send(&channel, Artifact::Profile(artifact));
                }
                Err(e) => warn!("Failed to collect profile of session {}: {}", session.id(), e),
            }
        });
    }

    /// Take a heap snapshot and deliver it
    ///
    /// The caller is acknowledged first; the capture starts after the
    /// configured grace period. A capture failure, including one that
    /// exceeds the snapshot timeout, invokes `callback` a second time with a
    /// failure acknowledgment.
    pub fn take_heapdump(self: &Arc<Self>, options: Option<Value>, callback: AckCallback) {
        let options = ActionOptions::from_value(options.as_ref());

        let Some(backend) = self.backend() else {
            callback(Ack::failure(&CoordinatorError::ProfilerNotAvailable));
            return;
        };

        let origin = options
            .origin
            .unwrap_or_else(|| self.config.default_origin().to_string());

        callback(Ack::ok());

        let grace = self.config.snapshot_grace_period();
        let channel = self.config.artifact_channel().to_string();
        let inspector = backend.inspector.clone();
        let sink = backend.sink.clone();
        let coordinator = Arc::downgrade(self);

        backend.runtime.spawn(async move {
            tokio::time::sleep(grace).await;

            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            if coordinator.backend().is_none() {
                callback(Ack::failure(&CoordinatorError::ProfilerNotAvailable));
                return;
            }

            let _capture = coordinator.snapshot_lock.lock().await;
            let started_at = SystemTime::now();
            let started = Instant::now();

            let timeout = coordinator.config.snapshot_timeout();
            let capture = tokio::time::timeout(timeout, capture_heap_snapshot(inspector.as_ref()))
                .await
                .unwrap_or_else(|_| {
                    Err(CoordinatorError::SnapshotTimeout(
                        coordinator.config.snapshot_timeout_ms(),
                    ))
                });

            match capture {
                Ok(data) => {
                    let artifact =
                        HeapdumpArtifact::new(data, started_at, origin, started.elapsed());
                    info!(
                        "Delivering heapdump ({} bytes, {} ms)",
                        artifact.data.len(),
                        artifact.duration_ms
                    );
                    sink.send(&channel, Artifact::Heapdump(artifact));
                }
                Err(e) => {
                    warn!("Heap snapshot failed: {}", e);
                    callback(Ack::failure(&e));
                }
            }
        });
    }

    /// Disable both domains
    ///
    /// An in-flight session is not flushed, and a stop whose result is
    /// still pending is discarded. Later operations report the profiler
    /// as unavailable.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Profiling coordinator shutting down");

        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if let Some(session) = self.session.current() {
            warn!(
                "Session {} still running at shutdown, its profile is dropped",
                session.id()
            );
        }

        for method in [profiler::DISABLE, heap_profiler::DISABLE] {
            if let Err(e) = backend.commands.request(method, None).await {
                warn!("{} failed: {}", method, e);
            }
        }
    }
}

/// Serialize the `profile` member of a stop result
fn serialize_profile(result: &Value) -> Result<String> {
    let profile = result.get("profile").ok_or_else(|| {
        CoordinatorError::Protocol(CdpError::invalid_params("stop result carries no profile"))
    })?;
    Ok(serde_json::to_string(profile)?)
}
