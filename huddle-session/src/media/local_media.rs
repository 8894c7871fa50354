use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

/// One captured track. A disabled track stays negotiated but its capture pump
/// stops writing samples.
pub struct LocalTrack {
    kind: TrackKind,
    track: Arc<TrackLocalStaticSample>,
    enabled: Arc<AtomicBool>,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, track: Arc<TrackLocalStaticSample>) -> Self {
        Self {
            kind,
            track,
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn track(&self) -> Arc<TrackLocalStaticSample> {
        self.track.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn enabled_flag(&self) -> Arc<AtomicBool> {
        self.enabled.clone()
    }
}

/// The local capture stream shared by every peer connection of a session.
pub struct LocalMedia {
    tracks: Vec<LocalTrack>,
    stopped: Arc<AtomicBool>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<LocalTrack>) -> Self {
        Self {
            tracks,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Capture without any tracks, used when the transport needs no media.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    /// Returns `false` when no track of that kind was captured.
    pub fn set_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        let mut found = false;
        for track in self.tracks.iter().filter(|t| t.kind == kind) {
            track.enabled.store(enabled, Ordering::SeqCst);
            found = true;
        }
        if found {
            debug!("Local {:?} track enabled = {}", kind, enabled);
        }
        found
    }

    pub fn is_enabled(&self, kind: TrackKind) -> Option<bool> {
        self.tracks
            .iter()
            .find(|t| t.kind == kind)
            .map(LocalTrack::is_enabled)
    }

    /// Stop capturing. Returns `true` only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        let first = !self.stopped.swap(true, Ordering::SeqCst);
        if first {
            for track in &self.tracks {
                track.enabled.store(false, Ordering::SeqCst);
            }
            info!("Local media capture stopped ({} tracks)", self.tracks.len());
        }
        first
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }
}

impl Drop for LocalMedia {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Supplier of the local capture stream. Acquisition may wait on a user
/// permission prompt for an arbitrary time.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self) -> anyhow::Result<Arc<LocalMedia>>;
}
