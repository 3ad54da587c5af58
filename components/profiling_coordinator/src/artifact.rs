//! Profiling artifacts and the sink they are delivered to
//!
//! Artifacts serialize to the field names the upstream collector expects:
//! the session id is `uuid`, the start time `at`, the origin `initiated`
//! and the kind `type`. Profile artifacts also carry a boolean keyed by
//! their kind (`"cpuprofile": true`).

use crate::session::{epoch_millis, ActiveSession, ProfileKind, SessionId};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Discriminator of a delivered artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Serialized CPU profile
    CpuProfile,
    /// Serialized sampling heap profile
    HeapProfile,
    /// Serialized heap snapshot
    Heapdump,
}

impl ArtifactKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::CpuProfile => "cpuprofile",
            ArtifactKind::HeapProfile => "heapprofile",
            ArtifactKind::Heapdump => "heapdump",
        }
    }
}

impl From<ProfileKind> for ArtifactKind {
    fn from(kind: ProfileKind) -> Self {
        match kind {
            ProfileKind::Cpu => ArtifactKind::CpuProfile,
            ProfileKind::HeapSampling => ArtifactKind::HeapProfile,
        }
    }
}

/// Result of a CPU or heap-sampling session
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileArtifact {
    /// Id returned to the caller at start
    pub id: SessionId,
    /// Session duration in milliseconds
    pub duration_ms: u64,
    /// Session start in milliseconds since the Unix epoch
    pub started_at_ms: u64,
    /// Serialized profile
    pub data: String,
    /// Always true for delivered profiles
    pub success: bool,
    /// Who requested the session
    pub origin: String,
    /// Profile kind
    pub kind: ArtifactKind,
}

impl ProfileArtifact {
    /// Build the artifact for a finished session, measuring its duration now
    pub fn from_session(session: &ActiveSession, data: String) -> Self {
        Self {
            id: session.id(),
            duration_ms: session.elapsed_ms(),
            started_at_ms: session.started_at_ms(),
            data,
            success: true,
            origin: session.origin().to_string(),
            kind: session.kind().into(),
        }
    }
}

impl Serialize for ProfileArtifact {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(8))?;
        map.serialize_entry("uuid", &self.id)?;
        map.serialize_entry("duration", &self.duration_ms)?;
        map.serialize_entry("at", &self.started_at_ms)?;
        map.serialize_entry("data", &self.data)?;
        map.serialize_entry("success", &self.success)?;
        map.serialize_entry("initiated", &self.origin)?;
        map.serialize_entry("type", &self.kind)?;
        map.serialize_entry(self.kind.as_str(), &true)?;
        map.end()
    }
}

/// Result of a heap snapshot capture
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeapdumpArtifact {
    /// Serialized snapshot
    pub data: String,
    /// Capture start in milliseconds since the Unix epoch
    #[serde(rename = "at")]
    pub started_at_ms: u64,
    /// Who requested the capture
    #[serde(rename = "initiated")]
    pub origin: String,
    /// Capture duration in milliseconds
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    #[serde(rename = "type")]
    kind: ArtifactKind,
}

impl HeapdumpArtifact {
    /// Build a heapdump artifact
    pub fn new(data: String, started_at: SystemTime, origin: String, duration: Duration) -> Self {
        Self {
            data,
            started_at_ms: epoch_millis(started_at),
            origin,
            duration_ms: duration.as_millis() as u64,
            kind: ArtifactKind::Heapdump,
        }
    }
}

/// Any artifact the coordinator delivers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Artifact {
    /// CPU or heap-sampling profile
    Profile(ProfileArtifact),
    /// Heap snapshot
    Heapdump(HeapdumpArtifact),
}

impl Artifact {
    /// Artifact kind
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Artifact::Profile(profile) => profile.kind,
            Artifact::Heapdump(_) => ArtifactKind::Heapdump,
        }
    }

    /// Serialized payload
    pub fn data(&self) -> &str {
        match self {
            Artifact::Profile(profile) => &profile.data,
            Artifact::Heapdump(dump) => &dump.data,
        }
    }

    /// Artifact as a JSON value
    pub fn to_json(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Destination for delivered artifacts
///
/// Delivery is fire-and-forget: the coordinator neither waits on nor
/// retries a send.
pub trait ArtifactSink: Send + Sync {
    /// Deliver `artifact` on `channel`
    fn send(&self, channel: &str, artifact: Artifact);
}

/// Sink forwarding artifacts over a tokio channel to a transport task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(String, Artifact)>,
}

impl ChannelSink {
    /// Create a sink and the receiver the transport drains
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, Artifact)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ArtifactSink for ChannelSink {
    fn send(&self, channel: &str, artifact: Artifact) {
        let kind = artifact.kind();
        if self.tx.send((channel.to_string(), artifact)).is_err() {
            warn!("Transport closed, dropping {} artifact", kind.as_str());
        } else {
            debug!("Queued {} artifact on channel {}", kind.as_str(), channel);
        }
    }
}
