//! In-process Profiler and HeapProfiler domains
//!
//! These handlers answer the inspector commands the profiling coordinator
//! issues, which makes them usable both as a reference backend and as a
//! test harness.
//!
//! # Features
//!
//! - **ProfilerDomain**: CPU profiling start/stop returning a `Profile`
//! - **HeapProfilerDomain**: heap sampling and streamed heap snapshots

mod heap_profiler_domain;
mod profiler_domain;

pub use heap_profiler_domain::{HeapProfilerDomain, DEFAULT_SNAPSHOT_CHUNK_SIZE};
pub use profiler_domain::ProfilerDomain;

use inspector_session::LocalInspector;
use std::sync::Arc;

/// Build a [`LocalInspector`] with both profiling domains registered
pub fn in_process_inspector() -> Arc<LocalInspector> {
    in_process_inspector_with_chunk_size(DEFAULT_SNAPSHOT_CHUNK_SIZE)
}

/// Same as [`in_process_inspector`], streaming snapshots in `chunk_size` pieces
pub fn in_process_inspector_with_chunk_size(chunk_size: usize) -> Arc<LocalInspector> {
    let inspector = Arc::new(LocalInspector::new());
    inspector.register_domain(Arc::new(ProfilerDomain::new()));
    inspector.register_domain(Arc::new(
        HeapProfilerDomain::new(inspector.emitter()).with_chunk_size(chunk_size),
    ));
    inspector
}
