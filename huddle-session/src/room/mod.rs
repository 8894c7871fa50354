mod lifecycle;
mod room_session;
mod session_command;
mod session_loop;
mod session_view;

pub use lifecycle::*;
pub use room_session::*;
pub use session_view::*;
