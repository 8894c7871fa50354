use huddle_core::{MemberId, SignalMessage};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Signals that arrived before their sender had a session, keyed by sender.
///
/// Entries are only handed out while younger than the grace period.
pub struct PendingSignals {
    grace: Duration,
    per_peer: usize,
    queued: HashMap<MemberId, VecDeque<(Instant, SignalMessage)>>,
}

impl PendingSignals {
    pub fn new(grace: Duration, per_peer: usize) -> Self {
        Self {
            grace,
            per_peer: per_peer.max(1),
            queued: HashMap::new(),
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Queue a signal. When the sender's queue is full the oldest entry is
    /// evicted and returned.
    pub fn push(&mut self, message: SignalMessage, now: Instant) -> Option<SignalMessage> {
        let queue = self.queued.entry(message.from.clone()).or_default();
        let evicted = if queue.len() >= self.per_peer {
            queue.pop_front().map(|(_, m)| m)
        } else {
            None
        };
        queue.push_back((now, message));
        evicted
    }

    /// Remove and return everything still fresh from `from`, oldest first.
    pub fn take(&mut self, from: &MemberId, now: Instant) -> Vec<SignalMessage> {
        let grace = self.grace;
        self.queued
            .remove(from)
            .map(|queue| {
                queue
                    .into_iter()
                    .filter(|(at, _)| now.saturating_duration_since(*at) < grace)
                    .map(|(_, m)| m)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop expired entries, returning how many were discarded.
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let grace = self.grace;
        let mut dropped = 0;
        self.queued.retain(|_, queue| {
            let before = queue.len();
            queue.retain(|(at, _)| now.saturating_duration_since(*at) < grace);
            dropped += before - queue.len();
            !queue.is_empty()
        });
        dropped
    }

    pub fn clear(&mut self) {
        self.queued.clear();
    }

    pub fn len(&self) -> usize {
        self.queued.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.queued.is_empty()
    }
}
