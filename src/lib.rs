//! Inspector-backed profiling for CortenBrowser
//!
//! Facade over the workspace crates: the profiling coordinator, the
//! inspector session boundary it drives, and the in-process Profiler and
//! HeapProfiler domains.
//!
//! # Example
//!
//! ```no_run
//! use inspector_profiling::{
//!     in_process_inspector, init_tracing, ActionService, ChannelSink, Collaborators,
//!     CoordinatorConfig, ProfilingCoordinator,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     init_tracing();
//!
//!     let actions = Arc::new(ActionService::new());
//!     let (sink, _artifacts) = ChannelSink::new();
//!     let _coordinator = ProfilingCoordinator::init(
//!         Collaborators::new()
//!             .inspector(in_process_inspector())
//!             .registry(actions.clone())
//!             .sink(Arc::new(sink)),
//!         CoordinatorConfig::default(),
//!     )
//!     .await;
//! }
//! ```

pub use cdp_types::{CdpError, CdpEvent};
pub use inspector_session::{InspectorSession, LocalInspector};
pub use profiler_domains::{in_process_inspector, in_process_inspector_with_chunk_size};
pub use profiling_coordinator::*;

use tracing_subscriber::EnvFilter;

/// Install a `fmt` subscriber filtered by `RUST_LOG` (default `info`)
///
/// Returns `false` when a global subscriber was already installed, which
/// makes repeated calls harmless.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok();
    if installed {
        tracing::debug!("Tracing initialized");
    }
    installed
}
