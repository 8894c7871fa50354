use crate::error::SessionError;
use crate::media::LocalMedia;
use crate::peer::{PeerSessionPool, PendingSignals, Role, SignalDisposition};
use crate::room::session_command::SessionCommand;
use crate::room::{Lifecycle, SessionView};
use crate::signaling::{RoomDirectory, SignalRelay};
use crate::subscription::Subscription;
use crate::transport::TransportEvent;
use huddle_core::{MemberId, PresenceEvent, PresenceMember, RoomId, SignalKind, SignalMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MIN_PURGE_PERIOD: Duration = Duration::from_millis(1);

/// External feeds opened during join. Dropping this releases them.
pub(crate) struct Feeds {
    pub presence_rx: mpsc::UnboundedReceiver<PresenceEvent>,
    pub signal_rx: mpsc::UnboundedReceiver<SignalMessage>,
    pub subscriptions: Vec<Subscription>,
}

pub(crate) struct SessionLoop {
    pub room_id: RoomId,
    pub local: PresenceMember,
    pub pool: PeerSessionPool,
    pub pending: PendingSignals,
    pub participants: HashMap<MemberId, PresenceMember>,
    pub feeds: Feeds,
    pub media: Arc<LocalMedia>,
    pub relay: Arc<dyn SignalRelay>,
    pub directory: Arc<dyn RoomDirectory>,
    pub counted: bool,
    pub lifecycle: Arc<watch::Sender<Lifecycle>>,
    pub view: Arc<watch::Sender<SessionView>>,
    pub notifications: broadcast::Sender<SessionError>,
    pub command_rx: mpsc::Receiver<SessionCommand>,
    pub transport_rx: mpsc::Receiver<TransportEvent>,
}

impl SessionLoop {
    /// Single consumer of every event touching the pool. Runs until an
    /// explicit leave or until all controller handles are gone; both end in
    /// [`SessionLoop::shutdown`].
    pub async fn run(mut self) {
        info!(
            "Session loop started for {} in room {}",
            self.local.member_id, self.room_id
        );

        let _closed = ClosedOnExit {
            lifecycle: self.lifecycle.clone(),
            media: self.media.clone(),
        };

        let mut purge = tokio::time::interval(self.pending.grace().max(MIN_PURGE_PERIOD));
        purge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut presence_open = true;
        let mut signals_open = true;

        loop {
            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Leave) => {
                            info!("Leave requested for room {}", self.room_id);
                            break;
                        }
                        None => {
                            warn!("Controller dropped without leaving. Tearing down room {}", self.room_id);
                            break;
                        }
                    }
                }

                Some(evt) = self.transport_rx.recv() => {
                    self.handle_transport_event(evt);
                }

                evt = self.feeds.presence_rx.recv(), if presence_open => {
                    match evt {
                        Some(e) => self.handle_presence(e).await,
                        None => {
                            warn!("Presence feed closed for room {}", self.room_id);
                            presence_open = false;
                        }
                    }
                }

                msg = self.feeds.signal_rx.recv(), if signals_open => {
                    match msg {
                        Some(m) => self.handle_signal(m),
                        None => {
                            warn!("Signal feed closed for room {}", self.room_id);
                            signals_open = false;
                        }
                    }
                }

                _ = purge.tick() => {
                    let dropped = self.pending.purge_expired(Instant::now());
                    if dropped > 0 {
                        debug!("Discarded {} signals whose sender never appeared", dropped);
                    }
                }
            }

            self.publish_view();
        }

        self.shutdown().await;
    }

    async fn handle_presence(&mut self, event: PresenceEvent) {
        match event {
            PresenceEvent::Sync(members) => self.reconcile(members).await,
            PresenceEvent::Join(members) => {
                for member in members {
                    debug!("Presence join: {}", member.member_id);
                    self.participants
                        .insert(member.member_id.clone(), member.clone());
                    self.ensure_session(member).await;
                }
            }
            PresenceEvent::Leave(members) => {
                for member in members {
                    debug!("Presence leave: {}", member.member_id);
                    self.participants.remove(&member.member_id);
                    if !self.pool.destroy(&member.member_id) {
                        debug!("No session to destroy for {}", member.member_id);
                    }
                }
            }
        }
    }

    /// Align the pool with an authoritative membership list.
    async fn reconcile(&mut self, members: Vec<PresenceMember>) {
        let present: HashMap<MemberId, PresenceMember> = members
            .into_iter()
            .map(|m| (m.member_id.clone(), m))
            .collect();

        for member_id in self.pool.member_ids() {
            if !present.contains_key(&member_id) {
                info!("{} is no longer present", member_id);
                self.pool.destroy(&member_id);
            }
        }

        let mut candidates: Vec<PresenceMember> = present
            .values()
            .filter(|m| m.member_id != self.local.member_id && !self.pool.contains(&m.member_id))
            .cloned()
            .collect();
        candidates.sort_by(|a, b| {
            (a.joined_at, &a.member_id).cmp(&(b.joined_at, &b.member_id))
        });

        debug!(
            "Presence sync: {} present, {} sessions to create",
            present.len(),
            candidates.len()
        );
        self.participants = present;

        for member in candidates {
            self.ensure_session(member).await;
        }
    }

    async fn ensure_session(&mut self, member: PresenceMember) {
        if member.member_id == self.local.member_id || self.pool.contains(&member.member_id) {
            return;
        }

        let role = Role::for_pair(&self.local.member_id, &member.member_id);
        match self.pool.create(&member, role).await {
            Ok(_) => {}
            Err(SessionError::DuplicateSession(id)) => {
                error!("Session for {} already existed after presence check", id);
                return;
            }
            Err(e) => {
                warn!("Could not create session for {}: {}", member.member_id, e);
                let _ = self.notifications.send(e);
                return;
            }
        }

        for message in self.pending.take(&member.member_id, Instant::now()) {
            debug!("Replaying buffered {:?} from {}", message.kind, message.from);
            self.apply_signal(message);
        }
    }

    fn handle_signal(&mut self, message: SignalMessage) {
        if message.room_id != self.room_id || message.to != self.local.member_id {
            warn!(
                "Dropping signal for {} in room {}: not addressed to this session",
                message.to, message.room_id
            );
            return;
        }
        if message.from == self.local.member_id {
            warn!("Dropping signal that claims to come from the local member");
            return;
        }

        let local_role = Role::for_pair(&self.local.member_id, &message.from);
        let expected = match local_role {
            Role::Responder => SignalKind::Offer,
            Role::Initiator => SignalKind::Answer,
        };
        if message.kind != expected {
            warn!(
                "Dropping {:?} from {}: only {:?} is valid toward a {:?}",
                message.kind, message.from, expected, local_role
            );
            return;
        }

        self.apply_signal(message);
    }

    fn apply_signal(&mut self, message: SignalMessage) {
        match self
            .pool
            .apply_inbound_signal(&message.from, message.kind, &message.payload)
        {
            Ok(SignalDisposition::Applying) => {
                debug!("Applying {:?} from {}", message.kind, message.from);
            }
            Ok(SignalDisposition::Ignored(reason)) => {
                debug!("Ignored {:?} from {}: {}", message.kind, message.from, reason);
            }
            Ok(SignalDisposition::Deferred) => {
                debug!(
                    "Holding new {:?} from {} until its current session is replaced",
                    message.kind, message.from
                );
                self.buffer_signal(message);
            }
            Err(SessionError::UnknownPeer(from)) => {
                debug!("Buffering {:?} from {} until a session exists", message.kind, from);
                self.buffer_signal(message);
            }
            Err(e) => warn!("Failed to apply signal from {}: {}", message.from, e),
        }
    }

    fn buffer_signal(&mut self, message: SignalMessage) {
        if let Some(evicted) = self.pending.push(message, Instant::now()) {
            warn!("Pending signal queue for {} full, dropped oldest {:?}", evicted.from, evicted.kind);
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::LocalSignal {
                member_id,
                session_id,
                kind,
                payload,
            } => {
                if !self.pool.record_local_signal(&member_id, session_id, kind) {
                    debug!("Discarding stale local {:?} for {}", kind, member_id);
                    return;
                }
                self.dispatch_signal(SignalMessage {
                    room_id: self.room_id.clone(),
                    from: self.local.member_id.clone(),
                    to: member_id,
                    kind,
                    payload,
                });
            }

            TransportEvent::RemoteSignalApplied {
                member_id,
                session_id,
            } => {
                if self.pool.mark_remote_applied(&member_id, session_id) {
                    info!("Handshake with {} complete", member_id);
                }
            }

            TransportEvent::Connected { member_id, .. } => {
                info!("Media path to {} established", member_id);
            }

            TransportEvent::Failed {
                member_id,
                session_id,
                reason,
            } => {
                if self.pool.destroy_session(&member_id, session_id) {
                    error!("Connection to {} failed: {}", member_id, reason);
                    let _ = self.notifications.send(SessionError::PeerConnection {
                        member_id,
                        reason,
                    });
                }
            }
        }
    }

    /// Send without holding up the loop. Failures only notify; the session
    /// stays where it is and the next presence sync reconciles again.
    fn dispatch_signal(&self, message: SignalMessage) {
        let relay = self.relay.clone();
        let notifications = self.notifications.clone();

        tokio::spawn(async move {
            let to = message.to.clone();
            let kind = message.kind;
            if let Err(e) = relay.send(message).await {
                warn!("Failed to deliver {:?} to {}: {:?}", kind, to, e);
                let _ = notifications.send(SessionError::DeliveryFailed {
                    to,
                    kind,
                    reason: e.to_string(),
                });
            }
        });
    }

    fn publish_view(&self) {
        let mut participants: Vec<PresenceMember> = self.participants.values().cloned().collect();
        participants.sort_by(|a, b| {
            (a.joined_at, &a.member_id).cmp(&(b.joined_at, &b.member_id))
        });

        self.view.send_replace(SessionView {
            participants,
            peers: self.pool.list_active(),
            pending_signals: self.pending.len(),
        });
    }

    async fn shutdown(mut self) {
        self.lifecycle.send_replace(Lifecycle::Leaving);

        let destroyed = self.pool.destroy_all();
        self.pending.clear();
        self.feeds.subscriptions.clear();
        self.media.stop();

        if self.counted {
            match self.directory.decrement_participants(&self.room_id).await {
                Ok(count) => debug!("Room {} now has {} participants", self.room_id, count),
                Err(e) => warn!("Failed to decrement participants of {}: {:?}", self.room_id, e),
            }
        }

        self.participants.clear();
        self.publish_view();
        self.lifecycle.send_replace(Lifecycle::Closed);

        info!(
            "Left room {} ({} peer sessions destroyed)",
            self.room_id, destroyed
        );
    }
}

/// Stops capture and reports Closed when the loop task ends, unwinding
/// included, so `leave` never waits on a dead loop.
struct ClosedOnExit {
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    media: Arc<LocalMedia>,
}

impl Drop for ClosedOnExit {
    fn drop(&mut self) {
        self.media.stop();
        self.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Closed {
                return false;
            }
            *state = Lifecycle::Closed;
            true
        });
    }
}
