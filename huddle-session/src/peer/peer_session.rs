use crate::media::RemoteMediaSink;
use crate::peer::{PeerState, Role};
use crate::transport::PeerConnection;
use huddle_core::MemberId;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Identity of one session object. A member that comes back after its session
/// closed gets a new id together with a fresh connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct PeerSession {
    id: SessionId,
    member_id: MemberId,
    display_name: String,
    role: Role,
    state: PeerState,
    connection: Arc<dyn PeerConnection>,
    remote_media: RemoteMediaSink,
    signal_in_flight: bool,
    applied_remote: Option<Vec<u8>>,
}

impl PeerSession {
    pub(crate) fn new(
        id: SessionId,
        member_id: MemberId,
        display_name: String,
        role: Role,
        connection: Arc<dyn PeerConnection>,
        remote_media: RemoteMediaSink,
    ) -> Self {
        Self {
            id,
            member_id,
            display_name,
            role,
            state: PeerState::Created,
            connection,
            remote_media,
            signal_in_flight: false,
            applied_remote: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub(crate) fn connection(&self) -> Arc<dyn PeerConnection> {
        self.connection.clone()
    }

    pub(crate) fn remote_media(&self) -> &RemoteMediaSink {
        &self.remote_media
    }

    pub(crate) fn signal_in_flight(&self) -> bool {
        self.signal_in_flight
    }

    pub(crate) fn set_signal_in_flight(&mut self, in_flight: bool) {
        self.signal_in_flight = in_flight;
    }

    /// Last remote description handed to the connection.
    pub(crate) fn applied_remote(&self) -> Option<&[u8]> {
        self.applied_remote.as_deref()
    }

    pub(crate) fn set_applied_remote(&mut self, payload: Vec<u8>) {
        self.applied_remote = Some(payload);
    }

    /// Apply a state change if the machine allows it.
    pub(crate) fn advance(&mut self, next: PeerState) -> bool {
        if !self.state.can_transition(next, self.role) {
            warn!(
                "Rejected transition {:?} -> {:?} for {} ({:?})",
                self.state, next, self.member_id, self.role
            );
            return false;
        }
        self.state = next;
        true
    }

    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            session_id: self.id,
            member_id: self.member_id.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            state: self.state,
            remote_media: self.remote_media.clone(),
        }
    }
}

/// Read-only copy of a peer session for presentation.
#[derive(Debug, Clone)]
pub struct PeerSummary {
    pub session_id: SessionId,
    pub member_id: MemberId,
    pub display_name: String,
    pub role: Role,
    pub state: PeerState,
    pub remote_media: RemoteMediaSink,
}
