//! ProfilerDomain implementation
//!
//! Handles CPU profiling commands for the in-process inspector.

use async_trait::async_trait;
use cdp_types::domains::profiler::{Profile, ProfileNode, StopReturn, DOMAIN};
use cdp_types::domains::runtime::CallFrame;
use cdp_types::CdpError;
use inspector_session::DomainHandler;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// ProfilerDomain handles CPU profiling
#[derive(Debug, Default)]
pub struct ProfilerDomain {
    /// Whether the domain is enabled
    enabled: AtomicBool,
    /// Whether profiling is currently active
    profiling_active: AtomicBool,
    /// Start time of profiling (microseconds since epoch)
    profile_start_time: RwLock<f64>,
}

impl ProfilerDomain {
    /// Create a new ProfilerDomain instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the domain is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Check if profiling is currently active
    pub fn is_profiling(&self) -> bool {
        self.profiling_active.load(Ordering::SeqCst)
    }

    /// Get current timestamp in microseconds
    fn get_timestamp_micros() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as f64)
            .unwrap_or(0.0)
    }

    fn handle_enable(&self) -> Result<Value, CdpError> {
        debug!("Profiler.enable called");
        self.enabled.store(true, Ordering::SeqCst);
        Ok(json!({}))
    }

    fn handle_disable(&self) -> Result<Value, CdpError> {
        debug!("Profiler.disable called");
        self.enabled.store(false, Ordering::SeqCst);
        self.profiling_active.store(false, Ordering::SeqCst);
        Ok(json!({}))
    }

    fn handle_start(&self) -> Result<Value, CdpError> {
        debug!("Profiler.start called");

        if !self.is_enabled() {
            return Err(CdpError::invalid_request());
        }

        self.profiling_active.store(true, Ordering::SeqCst);
        *self.profile_start_time.write() = Self::get_timestamp_micros();

        Ok(json!({}))
    }

    fn handle_stop(&self) -> Result<Value, CdpError> {
        debug!("Profiler.stop called");

        if !self.profiling_active.swap(false, Ordering::SeqCst) {
            return Err(CdpError::invalid_request());
        }

        let start_time = *self.profile_start_time.read();
        let end_time = Self::get_timestamp_micros().max(start_time);

        let ret = StopReturn {
            profile: Self::build_profile(start_time, end_time),
        };
        serde_json::to_value(ret).map_err(|e| CdpError::internal_error(e.to_string()))
    }

    /// Build a two-node profile spanning the recording window
    fn build_profile(start_time: f64, end_time: f64) -> Profile {
        let elapsed = (end_time - start_time).max(0.0) as u32;
        Profile {
            nodes: vec![
                ProfileNode {
                    id: 1,
                    call_frame: CallFrame::root(),
                    hit_count: Some(0),
                    children: Some(vec![2]),
                },
                ProfileNode {
                    id: 2,
                    call_frame: CallFrame::new("(program)", "0", "", 0, 0),
                    hit_count: Some(1),
                    children: None,
                },
            ],
            start_time,
            end_time,
            samples: Some(vec![2]),
            time_deltas: Some(vec![elapsed]),
        }
    }
}

#[async_trait]
impl DomainHandler for ProfilerDomain {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn handle_method(&self, method: &str, _params: Option<Value>) -> Result<Value, CdpError> {
        debug!("Profiler domain handling method: {}", method);

        match method {
            "enable" => self.handle_enable(),
            "disable" => self.handle_disable(),
            "start" => self.handle_start(),
            "stop" => self.handle_stop(),
            _ => {
                warn!("Unknown Profiler method: {}", method);
                Err(CdpError::method_not_found(format!("Profiler.{}", method)))
            }
        }
    }
}
