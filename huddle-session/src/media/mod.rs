mod local_media;
mod remote_sink;
mod synthetic;

pub use local_media::*;
pub use remote_sink::*;
pub use synthetic::*;
