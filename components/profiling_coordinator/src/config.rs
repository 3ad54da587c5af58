//! Configuration for the profiling coordinator

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the profiling coordinator
///
/// Holds the tunables of the session lifecycle: snapshot grace period,
/// default sampling interval, artifact channel and default origin label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoordinatorConfig {
    /// Delay between acknowledging a heapdump and starting the capture
    snapshot_grace_period_ms: u64,

    /// Longest a heap snapshot capture may run before it is abandoned
    snapshot_timeout_ms: u64,

    /// Heap sampling interval in bytes when the caller gives none
    default_sampling_interval: u64,

    /// Sink channel every artifact is delivered on
    artifact_channel: String,

    /// Origin recorded when the caller gives none
    default_origin: String,
}

impl CoordinatorConfig {
    /// Create a new builder for CoordinatorConfig
    ///
    /// # Example
    ///
    /// ```
    /// use profiling_coordinator::CoordinatorConfig;
    ///
    /// let config = CoordinatorConfig::builder()
    ///     .snapshot_grace_period_ms(50)
    ///     .build();
    /// assert_eq!(config.snapshot_grace_period_ms(), 50);
    /// ```
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::default()
    }

    /// Grace period in milliseconds
    pub fn snapshot_grace_period_ms(&self) -> u64 {
        self.snapshot_grace_period_ms
    }

    /// Grace period as a duration
    pub fn snapshot_grace_period(&self) -> Duration {
        Duration::from_millis(self.snapshot_grace_period_ms)
    }

    /// Capture timeout in milliseconds
    pub fn snapshot_timeout_ms(&self) -> u64 {
        self.snapshot_timeout_ms
    }

    /// Capture timeout as a duration
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_millis(self.snapshot_timeout_ms)
    }

    /// Default heap sampling interval in bytes
    pub fn default_sampling_interval(&self) -> u64 {
        self.default_sampling_interval
    }

    /// Sink channel name
    pub fn artifact_channel(&self) -> &str {
        &self.artifact_channel
    }

    /// Default origin label
    pub fn default_origin(&self) -> &str {
        &self.default_origin
    }
}

impl Default for CoordinatorConfig {
    /// Default values:
    /// - snapshot_grace_period_ms: 200
    /// - snapshot_timeout_ms: 120000
    /// - default_sampling_interval: 16384
    /// - artifact_channel: "profilings"
    /// - default_origin: "manual"
    fn default() -> Self {
        Self {
            snapshot_grace_period_ms: 200,
            snapshot_timeout_ms: 120_000,
            default_sampling_interval: 16384,
            artifact_channel: "profilings".to_string(),
            default_origin: "manual".to_string(),
        }
    }
}

/// Builder for CoordinatorConfig
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    snapshot_grace_period_ms: Option<u64>,
    snapshot_timeout_ms: Option<u64>,
    default_sampling_interval: Option<u64>,
    artifact_channel: Option<String>,
    default_origin: Option<String>,
}

impl CoordinatorConfigBuilder {
    /// Set the heapdump grace period in milliseconds
    pub fn snapshot_grace_period_ms(mut self, millis: u64) -> Self {
        self.snapshot_grace_period_ms = Some(millis);
        self
    }

    /// Set the heap snapshot capture timeout in milliseconds
    pub fn snapshot_timeout_ms(mut self, millis: u64) -> Self {
        self.snapshot_timeout_ms = Some(millis);
        self
    }

    /// Set the default heap sampling interval in bytes
    pub fn default_sampling_interval(mut self, bytes: u64) -> Self {
        self.default_sampling_interval = Some(bytes);
        self
    }

    /// Set the sink channel name
    pub fn artifact_channel(mut self, channel: impl Into<String>) -> Self {
        self.artifact_channel = Some(channel.into());
        self
    }

    /// Set the default origin label
    pub fn default_origin(mut self, origin: impl Into<String>) -> Self {
        self.default_origin = Some(origin.into());
        self
    }

    /// Build the CoordinatorConfig
    ///
    /// Uses default values for any options not explicitly set.
    pub fn build(self) -> CoordinatorConfig {
        let default = CoordinatorConfig::default();

        CoordinatorConfig {
            snapshot_grace_period_ms: self
                .snapshot_grace_period_ms
                .unwrap_or(default.snapshot_grace_period_ms),
            snapshot_timeout_ms: self
                .snapshot_timeout_ms
                .unwrap_or(default.snapshot_timeout_ms),
            default_sampling_interval: self
                .default_sampling_interval
                .unwrap_or(default.default_sampling_interval),
            artifact_channel: self.artifact_channel.unwrap_or(default.artifact_channel),
            default_origin: self.default_origin.unwrap_or(default.default_origin),
        }
    }
}

/// Profiling features advertised to the surrounding process
///
/// All four flags always move together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    /// Heapdump action available
    pub heapdump_enabled: bool,
    /// Heap snapshot feature available
    pub heap_snapshot_feature_enabled: bool,
    /// Heap sampling feature available
    pub heap_sampling_feature_enabled: bool,
    /// CPU profiling feature available
    pub cpu_profiling_feature_enabled: bool,
}

impl FeatureFlags {
    /// Every flag set to `enabled`
    pub fn all(enabled: bool) -> Self {
        Self {
            heapdump_enabled: enabled,
            heap_snapshot_feature_enabled: enabled,
            heap_sampling_feature_enabled: enabled,
            cpu_profiling_feature_enabled: enabled,
        }
    }
}
