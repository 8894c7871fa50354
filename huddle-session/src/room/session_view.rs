use crate::peer::PeerSummary;
use huddle_core::PresenceMember;

/// What presentation code needs to render a room session.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    /// Everyone the presence feed reports, the local member included, by
    /// join time.
    pub participants: Vec<PresenceMember>,
    /// Live peer sessions in creation order.
    pub peers: Vec<PeerSummary>,
    /// Signals held back until their sender shows up in presence.
    pub pending_signals: usize,
}
