use crate::media::TrackKind;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub kind: TrackKind,
    pub track_id: String,
    pub stream_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMedia {
    pub tracks: Vec<RemoteTrack>,
    pub detached: bool,
}

/// Where a peer's incoming media surfaces. Presentation code subscribes to it,
/// the transport publishes into it.
#[derive(Clone)]
pub struct RemoteMediaSink {
    inner: Arc<watch::Sender<RemoteMedia>>,
}

impl RemoteMediaSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RemoteMedia::default());
        Self { inner: Arc::new(tx) }
    }

    pub fn publish(&self, track: RemoteTrack) {
        self.inner.send_if_modified(|media| {
            if media.detached || media.tracks.iter().any(|t| t.track_id == track.track_id) {
                return false;
            }
            media.tracks.push(track);
            true
        });
    }

    pub fn detach(&self) {
        self.inner.send_if_modified(|media| {
            if media.detached {
                return false;
            }
            media.tracks.clear();
            media.detached = true;
            true
        });
    }

    pub fn is_detached(&self) -> bool {
        self.inner.borrow().detached
    }

    pub fn snapshot(&self) -> RemoteMedia {
        self.inner.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RemoteMedia> {
        self.inner.subscribe()
    }
}

impl Default for RemoteMediaSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RemoteMediaSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RemoteMediaSink").field(&*self.inner.borrow()).finish()
    }
}
