// Profiler domain types

use super::runtime::CallFrame;
use serde::{Deserialize, Serialize};

/// Domain name
pub const DOMAIN: &str = "Profiler";
/// Profiler.enable
pub const ENABLE: &str = "Profiler.enable";
/// Profiler.disable
pub const DISABLE: &str = "Profiler.disable";
/// Profiler.start
pub const START: &str = "Profiler.start";
/// Profiler.stop
pub const STOP: &str = "Profiler.stop";

/// Profile node identifier
pub type ProfileNodeId = u32;

/// Profile node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileNode {
    /// Unique identifier
    pub id: ProfileNodeId,
    /// Function call frame
    pub call_frame: CallFrame,
    /// Number of samples where this node was on top of the call stack
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_count: Option<u32>,
    /// Child node IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<ProfileNodeId>>,
}

/// Profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    /// Profile nodes
    pub nodes: Vec<ProfileNode>,
    /// Profile start time (microseconds)
    pub start_time: f64,
    /// Profile end time (microseconds)
    pub end_time: f64,
    /// Sample node IDs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<ProfileNodeId>>,
    /// Time deltas between samples (microseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_deltas: Option<Vec<u32>>,
}

/// Return value of `Profiler.stop`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StopReturn {
    /// Recorded profile
    pub profile: Profile,
}
