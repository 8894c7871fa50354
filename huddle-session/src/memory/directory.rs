use crate::signaling::RoomDirectory;
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::RoomId;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryDirectory {
    participants: Arc<DashMap<RoomId, u32>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn participants(&self, room_id: &RoomId) -> u32 {
        self.participants
            .get(room_id)
            .map(|count| *count)
            .unwrap_or_default()
    }
}

#[async_trait]
impl RoomDirectory for InMemoryDirectory {
    async fn increment_participants(&self, room_id: &RoomId) -> anyhow::Result<u32> {
        let mut count = self.participants.entry(room_id.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement_participants(&self, room_id: &RoomId) -> anyhow::Result<u32> {
        let mut count = self.participants.entry(room_id.clone()).or_insert(0);
        *count = count.saturating_sub(1);
        Ok(*count)
    }
}
