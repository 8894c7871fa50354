use huddle_core::MemberId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    /// Role of `local` in its handshake with `remote`: the lower id initiates.
    ///
    /// Depends only on the two ids, so both ends reach complementary answers
    /// without talking to each other.
    pub fn for_pair(local: &MemberId, remote: &MemberId) -> Role {
        if local < remote {
            Role::Initiator
        } else {
            Role::Responder
        }
    }
}
