mod member;
mod presence;
mod room;
mod signaling;

pub use member::MemberId;
pub use presence::{PresenceEvent, PresenceMember};
pub use room::RoomId;
pub use signaling::{IceServerConfig, SignalKind, SignalMessage};
