use crate::model::member::MemberId;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Payload announced to the presence feed for one attached member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceMember {
    pub member_id: MemberId,
    pub display_name: String,
    /// Unix time in milliseconds at which the member started tracking.
    pub joined_at: u64,
}

impl PresenceMember {
    pub fn new(member_id: MemberId, display_name: impl Into<String>) -> Self {
        let joined_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            member_id,
            display_name: display_name.into(),
            joined_at,
        }
    }
}

/// Events emitted by a presence feed.
///
/// `Sync` carries the authoritative membership and replaces the local view.
/// `Join` and `Leave` are incremental and may be redelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "members", rename_all = "lowercase")]
pub enum PresenceEvent {
    Sync(Vec<PresenceMember>),
    Join(Vec<PresenceMember>),
    Leave(Vec<PresenceMember>),
}

impl PresenceEvent {
    pub fn members(&self) -> &[PresenceMember] {
        match self {
            PresenceEvent::Sync(m) | PresenceEvent::Join(m) | PresenceEvent::Leave(m) => m,
        }
    }
}
