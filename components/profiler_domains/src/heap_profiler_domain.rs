//! HeapProfilerDomain implementation
//!
//! Handles heap sampling and heap snapshots for the in-process inspector.
//! Snapshots are streamed as `addHeapSnapshotChunk` events followed by
//! `reportHeapSnapshotProgress` events, the last one flagged `finished`.

use async_trait::async_trait;
use cdp_types::domains::heap_profiler::{
    AddHeapSnapshotChunk, ReportHeapSnapshotProgress, SamplingHeapProfile,
    SamplingHeapProfileNode, SamplingHeapProfileSample, StartSamplingParams, StopSamplingReturn,
    ADD_HEAP_SNAPSHOT_CHUNK, DOMAIN, REPORT_HEAP_SNAPSHOT_PROGRESS,
};
use cdp_types::domains::runtime::CallFrame;
use cdp_types::{CdpError, CdpEvent};
use inspector_session::{DomainHandler, EventEmitter};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{debug, warn};

/// Default size of a streamed snapshot chunk, in characters
pub const DEFAULT_SNAPSHOT_CHUNK_SIZE: usize = 64 * 1024;

const DEFAULT_SAMPLING_INTERVAL: u64 = 32768;

/// HeapProfilerDomain handles heap profiling and memory snapshots
pub struct HeapProfilerDomain {
    /// Whether the domain is enabled
    enabled: AtomicBool,
    /// Whether heap sampling is currently active
    sampling_active: AtomicBool,
    /// Current sampling interval
    sampling_interval: RwLock<u64>,
    /// Number of snapshots taken so far
    snapshots_taken: AtomicU64,
    /// Maximum characters per snapshot chunk
    chunk_size: usize,
    /// Event sink for snapshot streaming
    emitter: EventEmitter,
}

impl HeapProfilerDomain {
    /// Create a new HeapProfilerDomain emitting events through `emitter`
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            sampling_active: AtomicBool::new(false),
            sampling_interval: RwLock::new(DEFAULT_SAMPLING_INTERVAL),
            snapshots_taken: AtomicU64::new(0),
            chunk_size: DEFAULT_SNAPSHOT_CHUNK_SIZE,
            emitter,
        }
    }

    /// Stream snapshots in pieces of at most `chunk_size` characters
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Check if the domain is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Check if heap sampling is currently active
    pub fn is_sampling(&self) -> bool {
        self.sampling_active.load(Ordering::SeqCst)
    }

    /// Sampling interval requested by the last `startSampling`
    pub fn sampling_interval(&self) -> u64 {
        *self.sampling_interval.read()
    }

    fn handle_enable(&self) -> Result<Value, CdpError> {
        debug!("HeapProfiler.enable called");
        self.enabled.store(true, Ordering::SeqCst);
        Ok(json!({}))
    }

    fn handle_disable(&self) -> Result<Value, CdpError> {
        debug!("HeapProfiler.disable called");
        self.enabled.store(false, Ordering::SeqCst);
        self.sampling_active.store(false, Ordering::SeqCst);
        Ok(json!({}))
    }

    fn handle_start_sampling(&self, params: Option<Value>) -> Result<Value, CdpError> {
        debug!("HeapProfiler.startSampling called");

        if !self.is_enabled() {
            return Err(CdpError::invalid_request());
        }

        if let Some(params) = params {
            let params: StartSamplingParams = serde_json::from_value(params)
                .map_err(|e| CdpError::invalid_params(e.to_string()))?;
            if let Some(interval) = params.sampling_interval {
                *self.sampling_interval.write() = interval;
            }
        }

        self.sampling_active.store(true, Ordering::SeqCst);
        Ok(json!({}))
    }

    fn handle_stop_sampling(&self) -> Result<Value, CdpError> {
        debug!("HeapProfiler.stopSampling called");

        if !self.sampling_active.swap(false, Ordering::SeqCst) {
            return Err(CdpError::invalid_request());
        }

        let ret = StopSamplingReturn {
            profile: self.build_sampling_profile(),
        };
        to_value(&ret)
    }

    fn handle_take_heap_snapshot(&self) -> Result<Value, CdpError> {
        debug!("HeapProfiler.takeHeapSnapshot called");

        if !self.is_enabled() {
            return Err(CdpError::invalid_request());
        }

        let ordinal = self.snapshots_taken.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Self::build_snapshot(ordinal);

        let chunks: Vec<String> = snapshot
            .chars()
            .collect::<Vec<_>>()
            .chunks(self.chunk_size)
            .map(|c| c.iter().collect())
            .collect();
        let total = chunks.len() as u64;

        for chunk in chunks {
            self.emit(ADD_HEAP_SNAPSHOT_CHUNK, &AddHeapSnapshotChunk { chunk })?;
        }
        self.emit(
            REPORT_HEAP_SNAPSHOT_PROGRESS,
            &ReportHeapSnapshotProgress {
                done: total,
                total,
                finished: Some(true),
            },
        )?;

        debug!("Heap snapshot {} streamed in {} chunks", ordinal, total);
        Ok(json!({}))
    }

    fn emit<T: Serialize>(&self, method: &str, payload: &T) -> Result<(), CdpError> {
        self.emitter.emit(CdpEvent::new(method, to_value(payload)?));
        Ok(())
    }

    /// Serialized snapshot document, in the V8 heapsnapshot layout
    fn build_snapshot(ordinal: u64) -> String {
        json!({
            "snapshot": {
                "meta": {
                    "node_fields": ["type", "name", "id", "self_size", "edge_count"],
                    "edge_fields": ["type", "name_or_index", "to_node"]
                },
                "node_count": 2,
                "edge_count": 1
            },
            "nodes": [0, 0, ordinal * 2 + 1, 0, 1, 3, 1, ordinal * 2 + 3, 64, 0],
            "edges": [1, 1, 5],
            "strings": ["(GC roots)", "(system)"]
        })
        .to_string()
    }

    fn build_sampling_profile(&self) -> SamplingHeapProfile {
        let interval = self.sampling_interval();
        SamplingHeapProfile {
            head: SamplingHeapProfileNode {
                call_frame: CallFrame::root(),
                self_size: 0,
                id: 0,
                children: vec![SamplingHeapProfileNode {
                    call_frame: CallFrame::new("(program)", "0", "", 0, 0),
                    self_size: interval,
                    id: 1,
                    children: vec![],
                }],
            },
            samples: vec![SamplingHeapProfileSample {
                size: interval,
                node_id: 1,
                ordinal: 1,
            }],
        }
    }
}

fn to_value<T: Serialize>(payload: &T) -> Result<Value, CdpError> {
    serde_json::to_value(payload).map_err(|e| CdpError::internal_error(e.to_string()))
}

#[async_trait]
impl DomainHandler for HeapProfilerDomain {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn handle_method(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        debug!("HeapProfiler domain handling method: {}", method);

        match method {
            "enable" => self.handle_enable(),
            "disable" => self.handle_disable(),
            "startSampling" => self.handle_start_sampling(params),
            "stopSampling" => self.handle_stop_sampling(),
            "takeHeapSnapshot" => self.handle_take_heap_snapshot(),
            _ => {
                warn!("Unknown HeapProfiler method: {}", method);
                Err(CdpError::method_not_found(format!(
                    "HeapProfiler.{}",
                    method
                )))
            }
        }
    }
}
