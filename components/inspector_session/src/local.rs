//! In-process inspector session
//!
//! Routes posted commands to registered [`DomainHandler`]s and fans events
//! out through an [`EventBus`].

use crate::{DomainHandler, EventBus, EventEmitter, EventSubscription, InspectorSession};
use async_trait::async_trait;
use cdp_types::{split_method, CdpError};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inspector session backed by in-process domain handlers
pub struct LocalInspector {
    /// Registry of domain handlers, keyed by domain name
    domains: DashMap<String, Arc<dyn DomainHandler>>,
    /// Event fan-out shared with the handlers
    bus: EventBus,
    /// Cleared by [`LocalInspector::disconnect`]
    connected: AtomicBool,
}

impl LocalInspector {
    /// Create a connected session with no domains
    pub fn new() -> Self {
        Self {
            domains: DashMap::new(),
            bus: EventBus::new(),
            connected: AtomicBool::new(true),
        }
    }

    /// Register a domain handler
    pub fn register_domain(&self, handler: Arc<dyn DomainHandler>) {
        let name = handler.name().to_string();
        debug!("Registering domain handler: {}", name);
        self.domains.insert(name, handler);
    }

    /// Unregister a domain handler
    pub fn unregister_domain(&self, domain_name: &str) -> Option<Arc<dyn DomainHandler>> {
        debug!("Unregistering domain handler: {}", domain_name);
        self.domains.remove(domain_name).map(|(_, v)| v)
    }

    /// Names of all registered domains
    pub fn registered_domains(&self) -> Vec<String> {
        self.domains.iter().map(|e| e.key().clone()).collect()
    }

    /// Emitter handed to domains that stream events
    pub fn emitter(&self) -> EventEmitter {
        self.bus.emitter()
    }

    /// Tear the session down
    ///
    /// Later commands fail with a session-closed error and every open event
    /// subscription ends.
    pub fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            info!("Local inspector session disconnected");
            self.bus.close();
        }
    }

    /// Whether the session still accepts commands
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

impl Default for LocalInspector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InspectorSession for LocalInspector {
    async fn post(&self, method: &str, params: Option<Value>) -> Result<Value, CdpError> {
        if !self.is_connected() {
            warn!("Command {} posted to a disconnected session", method);
            return Err(CdpError::session_closed());
        }

        let (domain_name, method_name) = split_method(method).ok_or_else(|| {
            warn!("Invalid method format (expected Domain.method): {}", method);
            CdpError::invalid_request()
        })?;

        debug!("Routing {} to domain: {}", method, domain_name);

        let handler = self
            .domains
            .get(domain_name)
            .ok_or_else(|| {
                warn!("Domain not found: {}", domain_name);
                CdpError::method_not_found(method)
            })?
            .clone();

        handler.handle_method(method_name, params).await
    }

    fn subscribe(&self, events: &[&str]) -> EventSubscription {
        self.bus.subscribe(events)
    }
}
