use crate::subscription::Subscription;
use async_trait::async_trait;
use huddle_core::{MemberId, RoomId, SignalMessage};
use tokio::sync::mpsc;

/// Point-to-point delivery of handshake messages between two members.
///
/// Delivery is at-least-once and ordered per sender only.
#[async_trait]
pub trait SignalRelay: Send + Sync {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()>;

    /// Deliver every message of `room_id` addressed to `local` into `inbox`.
    async fn subscribe(
        &self,
        room_id: &RoomId,
        local: &MemberId,
        inbox: mpsc::UnboundedSender<SignalMessage>,
    ) -> anyhow::Result<Subscription>;
}
