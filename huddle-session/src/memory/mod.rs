//! Process-local adapters. They back the simulator and the test suite and
//! follow the same delivery contracts as hosted presence and relay services.

mod directory;
mod presence;
mod relay;

pub use directory::InMemoryDirectory;
pub use presence::InMemoryPresence;
pub use relay::{InMemoryRelay, SENT_LOG_CAPACITY};
