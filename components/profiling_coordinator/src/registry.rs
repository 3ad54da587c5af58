//! Action registry boundary
//!
//! The surrounding agent dispatches remote actions by name. The coordinator
//! registers one handler per operation under the fixed names below.

use crate::ack::{Ack, AckCallback};
use crate::error::{CoordinatorError, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Take a heap snapshot
pub const HEAPDUMP: &str = "heapdump";
/// Start CPU profiling
pub const CPU_PROFILING_START: &str = "cpu-profiling-start";
/// Stop CPU profiling
pub const CPU_PROFILING_STOP: &str = "cpu-profiling-stop";
/// Start heap sampling
pub const HEAP_PROFILING_START: &str = "heap-profiling-start";
/// Stop heap sampling
pub const HEAP_PROFILING_STOP: &str = "heap-profiling-stop";

/// Every action the coordinator registers
pub const ACTION_NAMES: [&str; 5] = [
    HEAPDUMP,
    CPU_PROFILING_START,
    CPU_PROFILING_STOP,
    HEAP_PROFILING_START,
    HEAP_PROFILING_STOP,
];

/// Handler invoked with the caller's raw options and its acknowledgment callback
pub type ActionHandler = Arc<dyn Fn(Option<Value>, AckCallback) + Send + Sync>;

/// Registry mapping action names to handlers
pub trait ActionRegistry: Send + Sync {
    /// Register `handler` under `name`
    fn register_action(&self, name: &str, handler: ActionHandler) -> Result<()>;
}

/// In-memory action registry
#[derive(Default)]
pub struct ActionService {
    actions: DashMap<String, ActionHandler>,
}

impl ActionService {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the handler registered under `name`
    ///
    /// Returns `false` when no such action exists; the callback then
    /// receives a failure acknowledgment.
    pub fn invoke(&self, name: &str, options: Option<Value>, callback: AckCallback) -> bool {
        let handler = match self.actions.get(name) {
            Some(handler) => handler.clone(),
            None => {
                warn!("Unknown action: {}", name);
                callback(Ack {
                    success: false,
                    err: Some(format!("Unknown action: {}", name)),
                    id: None,
                });
                return false;
            }
        };

        debug!("Invoking action {}", name);
        handler(options, callback);
        true
    }

    /// Whether an action is registered under `name`
    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered action names, sorted
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl ActionRegistry for ActionService {
    fn register_action(&self, name: &str, handler: ActionHandler) -> Result<()> {
        match self.actions.entry(name.to_string()) {
            Entry::Occupied(_) => Err(CoordinatorError::Registration(format!(
                "action {} is already registered",
                name
            ))),
            Entry::Vacant(entry) => {
                debug!("Registered action {}", name);
                entry.insert(handler);
                Ok(())
            }
        }
    }
}
