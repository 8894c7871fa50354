use crate::peer::Role;
use serde::{Deserialize, Serialize};

/// Handshake progress of one peer session.
///
/// ```text
/// Created -> SignalSent           (initiator produced its offer)
/// Created -> AwaitingLocalSignal  (responder waiting to answer)
/// SignalSent -> Connected         (answer applied)
/// AwaitingLocalSignal -> Connected (offer applied, answer produced)
/// any -> Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerState {
    Created,
    SignalSent,
    AwaitingLocalSignal,
    Connected,
    Closed,
}

impl PeerState {
    pub fn can_transition(self, next: PeerState, role: Role) -> bool {
        use PeerState::*;

        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Created, SignalSent) | (SignalSent, Connected) => role == Role::Initiator,
            (Created, AwaitingLocalSignal) | (AwaitingLocalSignal, Connected) => {
                role == Role::Responder
            }
            _ => false,
        }
    }

    pub fn is_live(self) -> bool {
        self != PeerState::Closed
    }
}
