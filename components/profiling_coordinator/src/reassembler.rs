//! Heap snapshot chunk reassembly
//!
//! The inspector streams a snapshot as `addHeapSnapshotChunk` events and
//! signals completion with a `reportHeapSnapshotProgress` event whose
//! `finished` flag is set. The reassembler concatenates chunks in arrival
//! order and resolves exactly once.

use crate::error::{CoordinatorError, Result};
use cdp_types::domains::heap_profiler::{
    AddHeapSnapshotChunk, TakeHeapSnapshotParams, ADD_HEAP_SNAPSHOT_CHUNK,
    REPORT_HEAP_SNAPSHOT_PROGRESS, TAKE_HEAP_SNAPSHOT,
};
use cdp_types::CdpEvent;
use inspector_session::InspectorSession;
use serde_json::Value;
use tracing::{debug, warn};

/// Lifecycle of one capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Accepting chunks
    Listening,
    /// Resolved with the concatenated snapshot
    Finished,
    /// Aborted; no further events are accepted
    Failed,
}

/// Accumulates the chunks of one snapshot
#[derive(Debug)]
pub struct ChunkReassembler {
    chunks: Vec<String>,
    state: CaptureState,
}

impl ChunkReassembler {
    /// Create a reassembler in the listening state
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            state: CaptureState::Listening,
        }
    }

    /// Current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Number of chunks buffered so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Feed one protocol event
    ///
    /// Returns the full snapshot when `event` is the terminal progress event.
    /// Progress events without `finished: true` and unrelated events are
    /// ignored. Once finished or failed, every event is ignored.
    pub fn on_event(&mut self, event: &CdpEvent) -> Result<Option<String>> {
        if self.state != CaptureState::Listening {
            return Ok(None);
        }

        match event.method.as_str() {
            ADD_HEAP_SNAPSHOT_CHUNK => {
                let chunk: AddHeapSnapshotChunk = event.decode().map_err(|e| {
                    self.state = CaptureState::Failed;
                    CoordinatorError::from(e)
                })?;
                self.chunks.push(chunk.chunk);
                Ok(None)
            }
            REPORT_HEAP_SNAPSHOT_PROGRESS => {
                // only the terminal flag matters; done/total are never read
                let finished = event.params.get("finished").and_then(Value::as_bool);
                if finished == Some(true) {
                    Ok(Some(self.finish()))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    fn finish(&mut self) -> String {
        self.state = CaptureState::Finished;
        std::mem::take(&mut self.chunks).concat()
    }

    /// Abort the capture, discarding buffered chunks
    pub fn fail(&mut self) {
        self.state = CaptureState::Failed;
        self.chunks.clear();
    }
}

impl Default for ChunkReassembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Take a heap snapshot and return it as one string
///
/// The subscription is registered before the command is posted so no chunk
/// can be missed, and it is released as soon as the capture resolves or
/// fails. If the inspector goes away mid-capture the stream ends and the
/// capture fails instead of hanging.
pub async fn capture_heap_snapshot(inspector: &dyn InspectorSession) -> Result<String> {
    let mut subscription =
        inspector.subscribe(&[ADD_HEAP_SNAPSHOT_CHUNK, REPORT_HEAP_SNAPSHOT_PROGRESS]);
    let mut reassembler = ChunkReassembler::new();

    let params = TakeHeapSnapshotParams {
        report_progress: Some(true),
    };
    inspector
        .post(TAKE_HEAP_SNAPSHOT, Some(serde_json::to_value(params)?))
        .await?;

    while let Some(event) = subscription.recv().await {
        if let Some(snapshot) = reassembler.on_event(&event)? {
            subscription.unsubscribe();
            debug!("Heap snapshot reassembled ({} bytes)", snapshot.len());
            return Ok(snapshot);
        }
    }

    warn!(
        "Snapshot stream ended after {} chunks without completion",
        reassembler.chunk_count()
    );
    reassembler.fail();
    Err(CoordinatorError::SnapshotInterrupted)
}
