//! Error types for the profiling coordinator
//!
//! The display strings of the first three variants are what callers receive
//! in the `err` field of a failed acknowledgment.

use cdp_types::CdpError;
use thiserror::Error;

/// Errors that can occur in profiling coordinator operations
#[derive(Error, Debug)]
pub enum CoordinatorError {
    /// The inspector capability is missing or has been torn down
    #[error("Profiler not available")]
    ProfilerNotAvailable,

    /// A start was requested while a session is active
    #[error("A profiling is already running")]
    AlreadyRunning,

    /// A stop was requested with no matching session
    #[error("No profiling are already running")]
    NotRunning,

    /// The inspector rejected a command
    #[error("Inspector error: {0}")]
    Protocol(#[from] CdpError),

    /// The snapshot stream ended before the terminal progress event
    #[error("Heap snapshot interrupted: inspector session closed")]
    SnapshotInterrupted,

    /// The snapshot stream did not complete in time
    #[error("Heap snapshot timed out after {0} ms")]
    SnapshotTimeout(u64),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An action could not be registered
    #[error("Action registration failed: {0}")]
    Registration(String),
}

impl From<cdp_types::CdpProtocolError> for CoordinatorError {
    fn from(error: cdp_types::CdpProtocolError) -> Self {
        CoordinatorError::Protocol(error.into())
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
