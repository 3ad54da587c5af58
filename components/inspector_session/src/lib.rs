//! Inspector session boundary
//!
//! This module defines the capability the profiling coordinator drives: a
//! session that accepts `Domain.method` commands and emits protocol events.
//! It also ships an in-process implementation, [`LocalInspector`], which
//! routes commands to registered domain handlers.

pub mod events;
pub mod local;

use async_trait::async_trait;
use cdp_types::CdpError;
use serde_json::Value;

pub use events::{EventBus, EventEmitter, EventSubscription};
pub use local::LocalInspector;

/// A connected inspector session
///
/// Commands are posted asynchronously and resolve with the method's return
/// value. Events are observed through scoped subscriptions.
#[async_trait]
pub trait InspectorSession: Send + Sync {
    /// Post a command in "Domain.method" form
    async fn post(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError>;

    /// Subscribe to one or more event names
    ///
    /// Matching events are delivered in emission order on a single stream, so
    /// interleaved events of different names keep their relative ordering.
    fn subscribe(&self, events: &[&str]) -> EventSubscription;

    /// Enable a protocol domain
    async fn enable_domain(&self, domain: &str) -> Result<(), CdpError> {
        self.post(&format!("{}.enable", domain), None).await.map(|_| ())
    }

    /// Disable a protocol domain
    async fn disable_domain(&self, domain: &str) -> Result<(), CdpError> {
        self.post(&format!("{}.disable", domain), None)
            .await
            .map(|_| ())
    }
}

/// Trait that all in-process domain handlers must implement
///
/// Each handler is responsible for processing methods within its domain.
#[async_trait]
pub trait DomainHandler: Send + Sync {
    /// Returns the name of this domain (e.g., "Profiler", "HeapProfiler")
    fn name(&self) -> &str;

    /// Handle a method call for this domain
    ///
    /// # Arguments
    /// * `method` - The method name (without domain prefix, e.g., "start")
    /// * `params` - Optional parameters for the method
    async fn handle_method(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError>;
}
