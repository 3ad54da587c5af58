//! Acknowledgments returned to action callers

use crate::error::CoordinatorError;
use crate::session::SessionId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Acknowledgment payload handed to an action callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the request was accepted
    pub success: bool,
    /// Failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    /// Id of the session a start created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Ack {
    /// Plain success
    pub fn ok() -> Self {
        Self {
            success: true,
            err: None,
            id: None,
        }
    }

    /// Success carrying the id of a newly started session
    pub fn started(id: SessionId) -> Self {
        Self {
            id: Some(id.to_string()),
            ..Self::ok()
        }
    }

    /// Failure carrying the error's display string
    pub fn failure(error: &CoordinatorError) -> Self {
        Self {
            success: false,
            err: Some(error.to_string()),
            id: None,
        }
    }
}

/// Callback through which an action acknowledges its caller
///
/// A heapdump may invoke it a second time to report a capture failure.
pub type AckCallback = Arc<dyn Fn(Ack) + Send + Sync>;

/// Wrap a closure as an [`AckCallback`]
pub fn ack_callback<F>(f: F) -> AckCallback
where
    F: Fn(Ack) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Callback that discards its acknowledgment
pub fn noop_callback() -> AckCallback {
    Arc::new(|_| {})
}
