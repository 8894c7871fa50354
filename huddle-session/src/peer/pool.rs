use crate::error::{Result, SessionError};
use crate::media::{LocalMedia, RemoteMediaSink};
use crate::peer::{PeerSession, PeerState, PeerSummary, Role, SessionId};
use crate::transport::{
    ConnectionRequest, PeerConnectionFactory, TransportEvent, TransportEventSender,
};
use huddle_core::{MemberId, PresenceMember, SignalKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// What happened to an inbound signal addressed to a known session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Handed to the connection; completion arrives as a [`TransportEvent`].
    Applying,
    /// Redelivered, stale or out of place for the session's role and state.
    Ignored(&'static str),
    /// A new offer reached a connected session. It belongs to the member's
    /// next session and is held until this one is replaced.
    Deferred,
}

/// Live peer sessions of one room session, at most one per member.
///
/// The pool has a single owner; it is never shared across tasks. Connection
/// work is spawned and reports back through the transport event channel.
pub struct PeerSessionPool {
    sessions: HashMap<MemberId, PeerSession>,
    next_id: u64,
    factory: Arc<dyn PeerConnectionFactory>,
    media: Arc<LocalMedia>,
    transport_tx: mpsc::Sender<TransportEvent>,
}

impl PeerSessionPool {
    pub fn new(
        factory: Arc<dyn PeerConnectionFactory>,
        media: Arc<LocalMedia>,
        transport_tx: mpsc::Sender<TransportEvent>,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 0,
            factory,
            media,
            transport_tx,
        }
    }

    /// Create the session for `member`. An initiator immediately starts
    /// producing its offer; a responder waits for one.
    pub async fn create(&mut self, member: &PresenceMember, role: Role) -> Result<PeerSummary> {
        let member_id = member.member_id.clone();
        if self.sessions.contains_key(&member_id) {
            return Err(SessionError::DuplicateSession(member_id));
        }

        self.next_id += 1;
        let session_id = SessionId(self.next_id);
        let remote_media = RemoteMediaSink::new();
        let events =
            TransportEventSender::new(self.transport_tx.clone(), member_id.clone(), session_id);

        let connection = self
            .factory
            .connect(ConnectionRequest {
                member_id: member_id.clone(),
                role,
                media: self.media.clone(),
                remote_media: remote_media.clone(),
                events: events.clone(),
            })
            .await
            .map_err(|e| SessionError::PeerConnection {
                member_id: member_id.clone(),
                reason: e.to_string(),
            })?;

        let mut session = PeerSession::new(
            session_id,
            member_id.clone(),
            member.display_name.clone(),
            role,
            connection.clone(),
            remote_media,
        );

        match role {
            Role::Initiator => {
                session.set_signal_in_flight(true);
                tokio::spawn(async move {
                    match connection.create_offer().await {
                        Ok(offer) => events.local_signal(SignalKind::Offer, offer).await,
                        Err(e) => events.failed(format!("creating offer: {e}")).await,
                    }
                });
            }
            Role::Responder => {
                session.advance(PeerState::AwaitingLocalSignal);
            }
        }

        info!(
            "Created session {} for {} as {:?}",
            session_id, member_id, role
        );
        let summary = session.summary();
        self.sessions.insert(member_id, session);
        Ok(summary)
    }

    /// Route an inbound signal to the session of `from`.
    pub fn apply_inbound_signal(
        &mut self,
        from: &MemberId,
        kind: SignalKind,
        payload: &[u8],
    ) -> Result<SignalDisposition> {
        let session = self
            .sessions
            .get_mut(from)
            .ok_or_else(|| SessionError::UnknownPeer(from.clone()))?;

        if session.signal_in_flight() {
            return Ok(SignalDisposition::Ignored("a signal is already being applied"));
        }

        let connection = session.connection();
        let events = TransportEventSender::new(self.transport_tx.clone(), from.clone(), session.id());

        match (session.role(), session.state(), kind) {
            (Role::Responder, PeerState::AwaitingLocalSignal, SignalKind::Offer) => {
                session.set_applied_remote(payload.to_vec());
                let payload = payload.to_vec();
                tokio::spawn(async move {
                    match connection.accept_offer(payload).await {
                        Ok(answer) => events.local_signal(SignalKind::Answer, answer).await,
                        Err(e) => events.failed(format!("applying offer: {e}")).await,
                    }
                });
            }
            (Role::Initiator, PeerState::SignalSent, SignalKind::Answer) => {
                session.set_applied_remote(payload.to_vec());
                let payload = payload.to_vec();
                tokio::spawn(async move {
                    match connection.accept_answer(payload).await {
                        Ok(()) => events.remote_applied().await,
                        Err(e) => events.failed(format!("applying answer: {e}")).await,
                    }
                });
            }
            (Role::Responder, PeerState::Connected, SignalKind::Offer)
                if session.applied_remote() != Some(payload) =>
            {
                return Ok(SignalDisposition::Deferred);
            }
            (_, PeerState::Connected, _) => {
                return Ok(SignalDisposition::Ignored("session already connected"));
            }
            _ => {
                return Ok(SignalDisposition::Ignored(
                    "signal does not match session role and state",
                ));
            }
        }

        session.set_signal_in_flight(true);
        Ok(SignalDisposition::Applying)
    }

    /// Record a locally produced description. Returns `true` when it belongs
    /// to the current session and must be sent to the member.
    pub fn record_local_signal(
        &mut self,
        member_id: &MemberId,
        session_id: SessionId,
        kind: SignalKind,
    ) -> bool {
        let Some(session) = self.session_mut(member_id, session_id) else {
            return false;
        };
        session.set_signal_in_flight(false);

        let next = match (session.role(), kind) {
            (Role::Initiator, SignalKind::Offer) => PeerState::SignalSent,
            (Role::Responder, SignalKind::Answer) => PeerState::Connected,
            _ => return false,
        };
        session.advance(next)
    }

    /// Record that the remote answer was applied on the initiating side.
    pub fn mark_remote_applied(&mut self, member_id: &MemberId, session_id: SessionId) -> bool {
        let Some(session) = self.session_mut(member_id, session_id) else {
            return false;
        };
        session.set_signal_in_flight(false);
        session.role() == Role::Initiator && session.advance(PeerState::Connected)
    }

    /// Destroy the session of `member_id`. Returns whether one existed.
    pub fn destroy(&mut self, member_id: &MemberId) -> bool {
        match self.sessions.remove(member_id) {
            Some(session) => {
                close_session(session);
                true
            }
            None => false,
        }
    }

    /// Destroy the session of `member_id` only if it is still `session_id`.
    pub fn destroy_session(&mut self, member_id: &MemberId, session_id: SessionId) -> bool {
        if self.session_mut(member_id, session_id).is_none() {
            return false;
        }
        self.destroy(member_id)
    }

    pub fn destroy_all(&mut self) -> usize {
        let count = self.sessions.len();
        for (_, session) in self.sessions.drain() {
            close_session(session);
        }
        count
    }

    /// Active sessions in creation order.
    pub fn list_active(&self) -> Vec<PeerSummary> {
        let mut peers: Vec<_> = self
            .sessions
            .values()
            .filter(|s| s.state().is_live())
            .map(PeerSession::summary)
            .collect();
        peers.sort_by_key(|p| p.session_id);
        peers
    }

    pub fn get(&self, member_id: &MemberId) -> Option<PeerSummary> {
        self.sessions.get(member_id).map(PeerSession::summary)
    }

    pub fn contains(&self, member_id: &MemberId) -> bool {
        self.sessions.contains_key(member_id)
    }

    pub fn member_ids(&self) -> Vec<MemberId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn session_mut(&mut self, member_id: &MemberId, session_id: SessionId) -> Option<&mut PeerSession> {
        let session = self.sessions.get_mut(member_id)?;
        if session.id() != session_id {
            debug!(
                "Ignoring report for stale session {} of {} (current {})",
                session_id,
                member_id,
                session.id()
            );
            return None;
        }
        Some(session)
    }
}

fn close_session(mut session: PeerSession) {
    session.advance(PeerState::Closed);
    session.remote_media().detach();
    info!(
        "Destroyed session {} for {}",
        session.id(),
        session.member_id()
    );

    let connection = session.connection();
    let member_id = session.member_id().clone();
    tokio::spawn(async move {
        if let Err(e) = connection.close().await {
            warn!("Closing connection to {} failed: {:?}", member_id, e);
        }
    });
}
