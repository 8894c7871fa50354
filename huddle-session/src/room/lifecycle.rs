use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Constructed, `join` not called yet.
    Idle,
    Joining,
    Active,
    Leaving,
    /// Terminal.
    Closed,
}
