mod config;
mod error;
mod subscription;

pub mod media;
pub mod memory;
pub mod peer;
pub mod room;
pub mod signaling;
pub mod transport;

pub use config::*;
pub use error::*;
pub use subscription::*;

pub use media::*;
pub use peer::*;
pub use room::*;
pub use signaling::*;
pub use transport::*;
