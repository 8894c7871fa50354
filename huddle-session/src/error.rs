use crate::room::Lifecycle;
use huddle_core::{MemberId, SignalKind};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Local capture could not be acquired. Fatal to `join`.
    #[error("local media unavailable: {0}")]
    MediaUnavailable(String),

    /// The presence feed could not be subscribed or tracked. Fatal to `join`.
    #[error("presence unavailable: {0}")]
    PresenceUnavailable(String),

    /// The signal feed could not be subscribed. Fatal to `join`.
    #[error("signal relay unavailable: {0}")]
    RelayUnavailable(String),

    #[error("failed to deliver {kind:?} to {to}: {reason}")]
    DeliveryFailed {
        to: MemberId,
        kind: SignalKind,
        reason: String,
    },

    #[error("no session for peer {0}")]
    UnknownPeer(MemberId),

    #[error("connection to {member_id} failed: {reason}")]
    PeerConnection { member_id: MemberId, reason: String },

    #[error("session for {0} already exists")]
    DuplicateSession(MemberId),

    #[error("join cancelled by leave")]
    JoinCancelled,

    #[error("operation not allowed while {0:?}")]
    InvalidLifecycle(Lifecycle),
}

impl SessionError {
    /// Whether the error ends the whole room session rather than one peer.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::MediaUnavailable(_)
                | SessionError::PresenceUnavailable(_)
                | SessionError::RelayUnavailable(_)
                | SessionError::JoinCancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
