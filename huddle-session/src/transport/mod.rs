mod peer_connection;
mod transport_event;
mod webrtc_connection;

pub use peer_connection::*;
pub use transport_event::*;
pub use webrtc_connection::*;
