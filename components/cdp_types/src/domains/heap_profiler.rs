// HeapProfiler domain types

use super::runtime::CallFrame;
use serde::{Deserialize, Serialize};

/// Domain name
pub const DOMAIN: &str = "HeapProfiler";
/// HeapProfiler.enable
pub const ENABLE: &str = "HeapProfiler.enable";
/// HeapProfiler.disable
pub const DISABLE: &str = "HeapProfiler.disable";
/// HeapProfiler.startSampling
pub const START_SAMPLING: &str = "HeapProfiler.startSampling";
/// HeapProfiler.stopSampling
pub const STOP_SAMPLING: &str = "HeapProfiler.stopSampling";
/// HeapProfiler.takeHeapSnapshot
pub const TAKE_HEAP_SNAPSHOT: &str = "HeapProfiler.takeHeapSnapshot";
/// Event carrying one serialized piece of a heap snapshot
pub const ADD_HEAP_SNAPSHOT_CHUNK: &str = "HeapProfiler.addHeapSnapshotChunk";
/// Event reporting snapshot progress
pub const REPORT_HEAP_SNAPSHOT_PROGRESS: &str = "HeapProfiler.reportHeapSnapshotProgress";

/// Parameters of `HeapProfiler.startSampling`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartSamplingParams {
    /// Average sample interval in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampling_interval: Option<u64>,
}

/// Sampling heap profile node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingHeapProfileNode {
    /// Function location
    pub call_frame: CallFrame,
    /// Allocations size in bytes for the node excluding children
    pub self_size: u64,
    /// Node id
    pub id: u32,
    /// Child nodes
    pub children: Vec<SamplingHeapProfileNode>,
}

/// A single sample from a sampling heap profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SamplingHeapProfileSample {
    /// Allocation size in bytes attributed to the sample
    pub size: u64,
    /// Id of the corresponding profile tree node
    pub node_id: u32,
    /// Monotonically increasing ordinal
    pub ordinal: u64,
}

/// Sampling heap profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplingHeapProfile {
    /// Root of the allocation tree
    pub head: SamplingHeapProfileNode,
    /// Recorded samples
    pub samples: Vec<SamplingHeapProfileSample>,
}

/// Return value of `HeapProfiler.stopSampling`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopSamplingReturn {
    /// Recorded sampling heap profile
    pub profile: SamplingHeapProfile,
}

/// Parameters of `HeapProfiler.takeHeapSnapshot`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TakeHeapSnapshotParams {
    /// Emit `reportHeapSnapshotProgress` events while the snapshot is taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_progress: Option<bool>,
}

/// Payload of `HeapProfiler.addHeapSnapshotChunk`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddHeapSnapshotChunk {
    /// Serialized snapshot fragment
    pub chunk: String,
}

/// Payload of `HeapProfiler.reportHeapSnapshotProgress`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportHeapSnapshotProgress {
    /// Work done so far
    #[serde(default)]
    pub done: u64,
    /// Total work
    #[serde(default)]
    pub total: u64,
    /// Set on the last progress event of a snapshot
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

impl ReportHeapSnapshotProgress {
    /// Whether this event terminates the snapshot stream
    pub fn is_finished(&self) -> bool {
        self.finished == Some(true)
    }
}
