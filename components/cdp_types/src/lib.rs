// CDP protocol types, events, and error definitions
//
// Covers the subset of the inspector protocol used to drive profiling:
// the Profiler and HeapProfiler domains plus the event envelope.

pub mod domains;
pub mod errors;

// Re-export commonly used types
pub use errors::{CdpError, CdpProtocolError};

use serde::{Deserialize, Serialize};

/// CDP Event message
/// Represents an unsolicited event emitted by the inspector
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CdpEvent {
    /// Event name in format "Domain.event"
    pub method: String,
    /// Event parameters
    pub params: serde_json::Value,
}

impl CdpEvent {
    /// Create a new event
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Decode the event parameters into a typed payload
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T, CdpProtocolError> {
        T::deserialize(&self.params).map_err(CdpProtocolError::from)
    }
}

/// Split a "Domain.method" string into its domain and method parts
pub fn split_method(method: &str) -> Option<(&str, &str)> {
    match method.split_once('.') {
        Some((domain, name)) if !domain.is_empty() && !name.is_empty() => Some((domain, name)),
        _ => None,
    }
}
