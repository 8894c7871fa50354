use crate::signaling::PresenceService;
use crate::subscription::Subscription;
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{MemberId, PresenceEvent, PresenceMember, RoomId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Default)]
struct RoomPresence {
    members: HashMap<MemberId, PresenceMember>,
    subscribers: HashMap<u64, mpsc::UnboundedSender<PresenceEvent>>,
}

impl RoomPresence {
    fn snapshot(&self) -> Vec<PresenceMember> {
        let mut members: Vec<_> = self.members.values().cloned().collect();
        members.sort_by(|a, b| (a.joined_at, &a.member_id).cmp(&(b.joined_at, &b.member_id)));
        members
    }

    fn broadcast(&mut self, event: PresenceEvent) {
        self.subscribers
            .retain(|_, tx| tx.send(event.clone()).is_ok());
    }
}

#[derive(Default)]
struct PresenceInner {
    rooms: DashMap<RoomId, RoomPresence>,
    next_id: AtomicU64,
}

#[derive(Clone, Default)]
pub struct InMemoryPresence {
    inner: Arc<PresenceInner>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<PresenceMember> {
        self.inner
            .rooms
            .get(room_id)
            .map(|room| room.snapshot())
            .unwrap_or_default()
    }

    pub fn subscriber_count(&self, room_id: &RoomId) -> usize {
        self.inner
            .rooms
            .get(room_id)
            .map(|room| room.subscribers.len())
            .unwrap_or_default()
    }

    /// Send the current membership to every subscriber as a `sync`.
    pub fn broadcast_sync(&self, room_id: &RoomId) {
        if let Some(mut room) = self.inner.rooms.get_mut(room_id) {
            let snapshot = room.snapshot();
            room.broadcast(PresenceEvent::Sync(snapshot));
        }
    }

    /// Deliver an arbitrary event without touching the membership, to replay
    /// or reorder what subscribers observe.
    pub fn inject(&self, room_id: &RoomId, event: PresenceEvent) {
        if let Some(mut room) = self.inner.rooms.get_mut(room_id) {
            room.broadcast(event);
        }
    }
}

#[async_trait]
impl PresenceService for InMemoryPresence {
    async fn subscribe(
        &self,
        room_id: &RoomId,
        events: mpsc::UnboundedSender<PresenceEvent>,
    ) -> anyhow::Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        {
            let mut room = self.inner.rooms.entry(room_id.clone()).or_default();
            events.send(PresenceEvent::Sync(room.snapshot()))?;
            room.subscribers.insert(id, events);
        }
        debug!("Presence subscriber {} attached to {}", id, room_id);

        let inner = self.inner.clone();
        let room_id = room_id.clone();
        Ok(Subscription::new(move || {
            if let Some(mut room) = inner.rooms.get_mut(&room_id) {
                room.subscribers.remove(&id);
            }
        }))
    }

    async fn track(&self, room_id: &RoomId, member: PresenceMember) -> anyhow::Result<Subscription> {
        {
            let mut room = self.inner.rooms.entry(room_id.clone()).or_default();
            room.members.insert(member.member_id.clone(), member.clone());
            room.broadcast(PresenceEvent::Join(vec![member.clone()]));
        }
        debug!("{} tracked in {}", member.member_id, room_id);

        let inner = self.inner.clone();
        let room_id = room_id.clone();
        Ok(Subscription::new(move || {
            if let Some(mut room) = inner.rooms.get_mut(&room_id) {
                if room.members.remove(&member.member_id).is_some() {
                    room.broadcast(PresenceEvent::Leave(vec![member]));
                }
            }
        }))
    }
}
