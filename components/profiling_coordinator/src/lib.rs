//! Profiling session coordination for an inspector-backed runtime
//!
//! This crate exposes five remote actions (`heapdump`,
//! `cpu-profiling-start`, `cpu-profiling-stop`, `heap-profiling-start`,
//! `heap-profiling-stop`) on top of an inspector session. At most one CPU or
//! heap-sampling session runs at a time, and each finished session is
//! delivered to an artifact sink on the `profilings` channel.
//!
//! # Example
//!
//! ```no_run
//! use profiling_coordinator::{
//!     ack_callback, ActionService, ChannelSink, Collaborators, CoordinatorConfig,
//!     ProfilingCoordinator,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run(inspector: Arc<dyn inspector_session::InspectorSession>) {
//! let actions = Arc::new(ActionService::new());
//! let (sink, mut artifacts) = ChannelSink::new();
//!
//! let _coordinator = ProfilingCoordinator::init(
//!     Collaborators::new()
//!         .inspector(inspector)
//!         .registry(actions.clone())
//!         .sink(Arc::new(sink)),
//!     CoordinatorConfig::default(),
//! )
//! .await;
//!
//! actions.invoke(
//!     "cpu-profiling-start",
//!     Some(json!({ "timeout": 1000 })),
//!     ack_callback(|ack| println!("started: {:?}", ack.id)),
//! );
//! let (channel, artifact) = artifacts.recv().await.unwrap();
//! println!("{} -> {}", channel, artifact.kind().as_str());
//! # }
//! ```

mod ack;
mod artifact;
mod commands;
mod config;
mod coordinator;
mod error;
mod options;
mod reassembler;
mod registry;
mod session;

pub use ack::{ack_callback, noop_callback, Ack, AckCallback};
pub use artifact::{
    Artifact, ArtifactKind, ArtifactSink, ChannelSink, HeapdumpArtifact, ProfileArtifact,
};
pub use config::{CoordinatorConfig, CoordinatorConfigBuilder, FeatureFlags};
pub use coordinator::{Collaborators, ProfilingCoordinator};
pub use error::{CoordinatorError, Result};
pub use options::ActionOptions;
pub use reassembler::{capture_heap_snapshot, CaptureState, ChunkReassembler};
pub use registry::{
    ActionHandler, ActionRegistry, ActionService, ACTION_NAMES, CPU_PROFILING_START,
    CPU_PROFILING_STOP, HEAPDUMP, HEAP_PROFILING_START, HEAP_PROFILING_STOP,
};
pub use session::{ActiveSession, ProfileKind, SessionId, SessionSlot};
