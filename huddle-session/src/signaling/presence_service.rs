use crate::subscription::Subscription;
use async_trait::async_trait;
use huddle_core::{PresenceEvent, PresenceMember, RoomId};
use tokio::sync::mpsc;

/// Live membership feed of a room.
#[async_trait]
pub trait PresenceService: Send + Sync {
    /// Register for membership events of `room_id`.
    ///
    /// The first event delivered after subscribing must be a
    /// [`PresenceEvent::Sync`] carrying the full current membership.
    async fn subscribe(
        &self,
        room_id: &RoomId,
        events: mpsc::UnboundedSender<PresenceEvent>,
    ) -> anyhow::Result<Subscription>;

    /// Announce the local member. Presence is withdrawn when the returned
    /// handle is released.
    async fn track(&self, room_id: &RoomId, member: PresenceMember) -> anyhow::Result<Subscription>;
}
