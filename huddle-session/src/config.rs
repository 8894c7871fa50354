use huddle_core::IceServerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings for one room session controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ice_servers: Vec<IceServerConfig>,
    /// How long a signal from a member not yet seen in presence is kept.
    pub signal_grace_ms: u64,
    pub max_pending_per_peer: usize,
    pub event_queue_capacity: usize,
    /// Upper bound on local candidate gathering before a description is sent.
    pub ice_gathering_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServerConfig::stun("stun:stun.l.google.com:19302"),
                IceServerConfig::stun("stun:global.stun.twilio.com:3478"),
            ],
            signal_grace_ms: 10_000,
            max_pending_per_peer: 16,
            event_queue_capacity: 256,
            ice_gathering_timeout_ms: 5_000,
        }
    }
}

impl SessionConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn signal_grace(&self) -> Duration {
        Duration::from_millis(self.signal_grace_ms)
    }

    pub fn ice_gathering_timeout(&self) -> Duration {
        Duration::from_millis(self.ice_gathering_timeout_ms)
    }
}
