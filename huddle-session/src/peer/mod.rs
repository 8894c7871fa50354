mod peer_session;
mod peer_state;
mod pending_signals;
mod pool;
mod role;

pub use peer_session::*;
pub use peer_state::*;
pub use pending_signals::*;
pub use pool::*;
pub use role::*;
