use crate::signaling::SignalRelay;
use crate::subscription::Subscription;
use anyhow::bail;
use async_trait::async_trait;
use dashmap::DashMap;
use huddle_core::{MemberId, RoomId, SignalMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::debug;

type InboxKey = (RoomId, MemberId);

/// Most recent sends kept for inspection.
pub const SENT_LOG_CAPACITY: usize = 1024;

#[derive(Default)]
struct RelayInner {
    inboxes: DashMap<InboxKey, HashMap<u64, mpsc::UnboundedSender<SignalMessage>>>,
    next_id: AtomicU64,
    sent: Mutex<VecDeque<SignalMessage>>,
    failing: AtomicBool,
    duplicate: AtomicBool,
}

/// Relay that hands messages straight to live subscribers of the recipient.
/// Messages for a member without a subscriber are accepted and lost.
#[derive(Clone, Default)]
pub struct InMemoryRelay {
    inner: Arc<RelayInner>,
}

impl InMemoryRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send until switched off again.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// Deliver every accepted message twice.
    pub fn set_duplicate_delivery(&self, duplicate: bool) {
        self.inner.duplicate.store(duplicate, Ordering::SeqCst);
    }

    /// The last [`SENT_LOG_CAPACITY`] messages accepted by
    /// [`SignalRelay::send`], oldest first.
    pub fn sent(&self) -> Vec<SignalMessage> {
        self.inner
            .sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Push a message to the recipient's subscribers, bypassing the send log.
    /// Returns how many subscribers received it.
    pub fn deliver(&self, message: SignalMessage) -> usize {
        let key = (message.room_id.clone(), message.to.clone());
        let Some(mut inbox) = self.inner.inboxes.get_mut(&key) else {
            return 0;
        };
        inbox.retain(|_, tx| tx.send(message.clone()).is_ok());
        inbox.len()
    }

    pub fn subscriber_count(&self, room_id: &RoomId, member_id: &MemberId) -> usize {
        self.inner
            .inboxes
            .get(&(room_id.clone(), member_id.clone()))
            .map(|inbox| inbox.len())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SignalRelay for InMemoryRelay {
    async fn send(&self, message: SignalMessage) -> anyhow::Result<()> {
        if self.inner.failing.load(Ordering::SeqCst) {
            bail!("relay rejected {:?} to {}", message.kind, message.to);
        }

        {
            let mut sent = self.inner.sent.lock().unwrap_or_else(PoisonError::into_inner);
            if sent.len() == SENT_LOG_CAPACITY {
                sent.pop_front();
            }
            sent.push_back(message.clone());
        }

        let copies = if self.inner.duplicate.load(Ordering::SeqCst) { 2 } else { 1 };
        for _ in 0..copies {
            let delivered = self.deliver(message.clone());
            debug!("{:?} {} -> {} reached {} inboxes", message.kind, message.from, message.to, delivered);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        room_id: &RoomId,
        local: &MemberId,
        inbox: mpsc::UnboundedSender<SignalMessage>,
    ) -> anyhow::Result<Subscription> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let key = (room_id.clone(), local.clone());
        self.inner
            .inboxes
            .entry(key.clone())
            .or_default()
            .insert(id, inbox);

        let inner = self.inner.clone();
        Ok(Subscription::new(move || {
            if let Some(mut inbox) = inner.inboxes.get_mut(&key) {
                inbox.remove(&id);
            }
        }))
    }
}
