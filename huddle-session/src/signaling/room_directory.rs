use async_trait::async_trait;
use huddle_core::RoomId;

/// Room metadata store keeping a best-effort participant counter.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn increment_participants(&self, room_id: &RoomId) -> anyhow::Result<u32>;

    /// Decrement the counter, never going below zero.
    async fn decrement_participants(&self, room_id: &RoomId) -> anyhow::Result<u32>;
}
