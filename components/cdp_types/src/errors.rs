// CDP Error types
// Implements JSON-RPC 2.0 error codes and inspector-specific errors

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// CDP Error following JSON-RPC 2.0 error specification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CdpError {
    /// Error code (JSON-RPC standard codes)
    pub code: i32,
    /// Human-readable error message
    pub message: String,
    /// Additional error data (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for CdpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDP Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for CdpError {}

impl CdpError {
    /// Create a new CDP error
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create error with additional data
    pub fn with_data(code: i32, message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Invalid request (-32600)
    /// Sent when a command is issued in the wrong state (e.g. domain not enabled)
    pub fn invalid_request() -> Self {
        Self::new(-32600, "Invalid Request")
    }

    /// Method not found (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        let method = method.into();
        Self::with_data(
            -32601,
            "Method not found",
            serde_json::json!({ "method": method }),
        )
    }

    /// Invalid params (-32602)
    pub fn invalid_params(details: impl Into<String>) -> Self {
        let details = details.into();
        Self::with_data(
            -32602,
            "Invalid params",
            serde_json::json!({ "details": details }),
        )
    }

    /// Internal error (-32603)
    pub fn internal_error(details: impl Into<String>) -> Self {
        let details = details.into();
        Self::with_data(
            -32603,
            "Internal error",
            serde_json::json!({ "details": details }),
        )
    }

    /// Session closed (-32001)
    /// The inspector session is no longer connected
    pub fn session_closed() -> Self {
        Self::new(-32001, "Inspector session closed")
    }
}

/// Errors raised while interpreting protocol payloads
#[derive(Error, Debug)]
pub enum CdpProtocolError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic CDP error
    #[error("CDP error: {0}")]
    CdpError(#[from] CdpError),
}

impl From<CdpProtocolError> for CdpError {
    fn from(error: CdpProtocolError) -> Self {
        match error {
            CdpProtocolError::SerializationError(e) => CdpError::with_data(
                -32700,
                "Parse error",
                serde_json::json!({ "error": e.to_string() }),
            ),
            CdpProtocolError::CdpError(e) => e,
        }
    }
}
