mod presence_service;
mod room_directory;
mod signal_relay;

pub use presence_service::*;
pub use room_directory::*;
pub use signal_relay::*;
