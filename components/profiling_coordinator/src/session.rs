//! The single in-flight profiling session
//!
//! At most one CPU or heap-sampling session exists at a time. The slot is
//! checked and mutated inside one critical section, so a conflicting start
//! or a duplicate stop can never both succeed.

use crate::error::{CoordinatorError, Result};
use cdp_types::domains::{heap_profiler, profiler};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use uuid::Uuid;

/// Unique identifier for a profiling session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a new unique session ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of continuous profiling a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProfileKind {
    /// CPU sampling profiler
    Cpu,
    /// Heap sampling profiler
    HeapSampling,
}

impl ProfileKind {
    /// Command that stops this kind of profiling
    pub fn stop_method(&self) -> &'static str {
        match self {
            ProfileKind::Cpu => profiler::STOP,
            ProfileKind::HeapSampling => heap_profiler::STOP_SAMPLING,
        }
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A running profiling session
#[derive(Debug, Clone)]
pub struct ActiveSession {
    id: SessionId,
    kind: ProfileKind,
    origin: String,
    started_at: SystemTime,
    started: Instant,
}

impl ActiveSession {
    fn new(kind: ProfileKind, origin: String) -> Self {
        Self {
            id: SessionId::new(),
            kind,
            origin,
            started_at: SystemTime::now(),
            started: Instant::now(),
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Session kind
    pub fn kind(&self) -> ProfileKind {
        self.kind
    }

    /// Who requested the session
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Start time in milliseconds since the Unix epoch
    pub fn started_at_ms(&self) -> u64 {
        epoch_millis(self.started_at)
    }

    /// Milliseconds elapsed since the session started
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Holder of the at-most-one active session
#[derive(Debug, Default)]
pub struct SessionSlot {
    current: Mutex<Option<ActiveSession>>,
}

impl SessionSlot {
    /// Create an empty slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupy the slot with a new session
    ///
    /// Fails with [`CoordinatorError::AlreadyRunning`] and leaves the
    /// existing session untouched when the slot is taken.
    pub fn try_begin(&self, kind: ProfileKind, origin: String) -> Result<ActiveSession> {
        let mut current = self.current.lock();
        if current.is_some() {
            return Err(CoordinatorError::AlreadyRunning);
        }
        let session = ActiveSession::new(kind, origin);
        *current = Some(session.clone());
        Ok(session)
    }

    /// Remove the session if it is of `kind`
    pub fn take(&self, kind: ProfileKind) -> Result<ActiveSession> {
        let mut current = self.current.lock();
        match current.as_ref() {
            Some(session) if session.kind == kind => {
                current.take().ok_or(CoordinatorError::NotRunning)
            }
            _ => Err(CoordinatorError::NotRunning),
        }
    }

    /// Remove the session only if it is the one identified by `id`
    pub fn take_matching(&self, id: SessionId) -> Option<ActiveSession> {
        let mut current = self.current.lock();
        if current.as_ref().map(|s| s.id) == Some(id) {
            current.take()
        } else {
            None
        }
    }

    /// Snapshot of the active session
    pub fn current(&self) -> Option<ActiveSession> {
        self.current.lock().clone()
    }

    /// Whether a session of `kind` is active
    pub fn is_active(&self, kind: ProfileKind) -> bool {
        self.current
            .lock()
            .as_ref()
            .map_or(false, |s| s.kind == kind)
    }
}
