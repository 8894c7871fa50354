use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::media::{LocalMedia, MediaSource, TrackKind};
use crate::peer::{PeerSessionPool, PeerSummary, PendingSignals};
use crate::room::session_command::SessionCommand;
use crate::room::session_loop::{Feeds, SessionLoop};
use crate::room::{Lifecycle, SessionView};
use crate::signaling::{PresenceService, RoomDirectory, SignalRelay};
use crate::transport::PeerConnectionFactory;
use huddle_core::{MemberId, PresenceMember, RoomId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// External collaborators of a room session.
#[derive(Clone)]
pub struct SessionServices {
    pub presence: Arc<dyn PresenceService>,
    pub relay: Arc<dyn SignalRelay>,
    pub directory: Arc<dyn RoomDirectory>,
    pub media: Arc<dyn MediaSource>,
    pub connections: Arc<dyn PeerConnectionFactory>,
}

struct ControllerInner {
    room_id: RoomId,
    member_id: MemberId,
    display_name: String,
    config: SessionConfig,
    services: SessionServices,
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    view: Arc<watch::Sender<SessionView>>,
    notifications: broadcast::Sender<SessionError>,
    commands: OnceLock<mpsc::Sender<SessionCommand>>,
    media: OnceLock<Arc<LocalMedia>>,
}

/// Drives one member's presence in one room: joins, keeps the peer mesh in
/// line with presence, and tears everything down on leave.
///
/// Handles are cheap to clone. When the last handle is dropped without an
/// explicit [`leave`](Self::leave) the session tears itself down the same way.
#[derive(Clone)]
pub struct RoomSessionController {
    inner: Arc<ControllerInner>,
}

impl RoomSessionController {
    pub fn new(
        room_id: RoomId,
        member_id: MemberId,
        display_name: impl Into<String>,
        services: SessionServices,
        config: SessionConfig,
    ) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Idle);
        let (view, _) = watch::channel(SessionView::default());
        let (notifications, _) = broadcast::channel(64);

        Self {
            inner: Arc::new(ControllerInner {
                room_id,
                member_id,
                display_name: display_name.into(),
                config,
                services,
                lifecycle: Arc::new(lifecycle),
                view: Arc::new(view),
                notifications,
                commands: OnceLock::new(),
                media: OnceLock::new(),
            }),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.inner.room_id
    }

    pub fn member_id(&self) -> &MemberId {
        &self.inner.member_id
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.inner.lifecycle.borrow()
    }

    pub fn subscribe_lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.inner.lifecycle.subscribe()
    }

    pub fn view(&self) -> SessionView {
        self.inner.view.borrow().clone()
    }

    pub fn subscribe_view(&self) -> watch::Receiver<SessionView> {
        self.inner.view.subscribe()
    }

    pub fn peers(&self) -> Vec<PeerSummary> {
        self.inner.view.borrow().peers.clone()
    }

    /// Non-fatal errors: failed signal deliveries and failed peer connections.
    pub fn notifications(&self) -> broadcast::Receiver<SessionError> {
        self.inner.notifications.subscribe()
    }

    /// Acquire local media, attach to presence and the signal relay, and go
    /// active.
    ///
    /// Fails without leaving anything behind. A [`leave`](Self::leave) issued
    /// while this is in flight makes it return [`SessionError::JoinCancelled`]
    /// once media acquisition resolves.
    pub async fn join(&self) -> Result<()> {
        let inner = &self.inner;

        let mut current = Lifecycle::Idle;
        let started = inner.lifecycle.send_if_modified(|state| {
            current = *state;
            if *state == Lifecycle::Idle {
                *state = Lifecycle::Joining;
                return true;
            }
            false
        });
        if !started {
            return match current {
                Lifecycle::Active => Ok(()),
                other => Err(SessionError::InvalidLifecycle(other)),
            };
        }

        let mut guard = JoinGuard::new(inner.lifecycle.clone());
        info!("Joining room {} as {}", inner.room_id, inner.member_id);

        let media = inner.services.media.acquire().await.map_err(|e| {
            error!("Local media unavailable: {:?}", e);
            SessionError::MediaUnavailable(e.to_string())
        })?;

        if self.leave_requested() {
            media.stop();
            info!("Join of room {} cancelled during media acquisition", inner.room_id);
            return Err(SessionError::JoinCancelled);
        }

        let local = PresenceMember::new(inner.member_id.clone(), inner.display_name.clone());
        let feeds = match self.open_feeds(&local).await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!("Join of room {} failed: {}", inner.room_id, e);
                media.stop();
                return Err(e);
            }
        };

        if self.leave_requested() {
            drop(feeds);
            media.stop();
            info!("Join of room {} cancelled while attaching feeds", inner.room_id);
            return Err(SessionError::JoinCancelled);
        }

        let counted = match inner
            .services
            .directory
            .increment_participants(&inner.room_id)
            .await
        {
            Ok(count) => {
                debug!("Room {} now has {} participants", inner.room_id, count);
                true
            }
            Err(e) => {
                warn!("Failed to increment participants of {}: {:?}", inner.room_id, e);
                false
            }
        };

        let (command_tx, command_rx) = mpsc::channel(16);
        let (transport_tx, transport_rx) = mpsc::channel(inner.config.event_queue_capacity.max(1));
        let _ = inner.commands.set(command_tx.clone());
        let _ = inner.media.set(media.clone());

        let session_loop = SessionLoop {
            room_id: inner.room_id.clone(),
            local,
            pool: PeerSessionPool::new(
                inner.services.connections.clone(),
                media.clone(),
                transport_tx,
            ),
            pending: PendingSignals::new(
                inner.config.signal_grace(),
                inner.config.max_pending_per_peer,
            ),
            participants: HashMap::new(),
            feeds,
            media,
            relay: inner.services.relay.clone(),
            directory: inner.services.directory.clone(),
            counted,
            lifecycle: inner.lifecycle.clone(),
            view: inner.view.clone(),
            notifications: inner.notifications.clone(),
            command_rx,
            transport_rx,
        };
        tokio::spawn(session_loop.run());
        // From here on the loop owns teardown and the transition to Closed.
        guard.disarm();

        let activated = inner.lifecycle.send_if_modified(|state| {
            if *state == Lifecycle::Joining {
                *state = Lifecycle::Active;
                return true;
            }
            false
        });
        if !activated {
            let _ = command_tx.try_send(SessionCommand::Leave);
            self.wait_closed().await;
            info!("Join of room {} cancelled before activation", inner.room_id);
            return Err(SessionError::JoinCancelled);
        }

        info!("Room session {} active", inner.room_id);
        Ok(())
    }

    /// Tear the session down. Idempotent; returns once the session is Closed.
    pub async fn leave(&self) {
        let mut previous = None;
        self.inner.lifecycle.send_if_modified(|state| match *state {
            Lifecycle::Idle => {
                *state = Lifecycle::Closed;
                true
            }
            Lifecycle::Joining | Lifecycle::Active => {
                previous = Some(*state);
                *state = Lifecycle::Leaving;
                true
            }
            Lifecycle::Leaving | Lifecycle::Closed => false,
        });

        if previous == Some(Lifecycle::Active) {
            if let Some(commands) = self.inner.commands.get() {
                if commands.send(SessionCommand::Leave).await.is_err() {
                    debug!("Session loop of {} already stopped", self.inner.room_id);
                }
            }
        }

        self.wait_closed().await;
    }

    pub fn set_audio_enabled(&self, enabled: bool) -> bool {
        self.set_track_enabled(TrackKind::Audio, enabled)
    }

    pub fn set_video_enabled(&self, enabled: bool) -> bool {
        self.set_track_enabled(TrackKind::Video, enabled)
    }

    /// Flip the audio track. Returns the new state, or `None` without audio.
    pub fn toggle_audio(&self) -> Option<bool> {
        self.toggle_track(TrackKind::Audio)
    }

    pub fn toggle_video(&self) -> Option<bool> {
        self.toggle_track(TrackKind::Video)
    }

    pub fn is_audio_enabled(&self) -> Option<bool> {
        self.inner.media.get()?.is_enabled(TrackKind::Audio)
    }

    pub fn is_video_enabled(&self) -> Option<bool> {
        self.inner.media.get()?.is_enabled(TrackKind::Video)
    }

    fn set_track_enabled(&self, kind: TrackKind, enabled: bool) -> bool {
        match self.inner.media.get() {
            Some(media) if !media.is_stopped() => media.set_enabled(kind, enabled),
            _ => false,
        }
    }

    fn toggle_track(&self, kind: TrackKind) -> Option<bool> {
        let media = self.inner.media.get()?;
        if media.is_stopped() {
            return None;
        }
        let next = !media.is_enabled(kind)?;
        media.set_enabled(kind, next);
        Some(next)
    }

    async fn open_feeds(&self, local: &PresenceMember) -> Result<Feeds> {
        let inner = &self.inner;
        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        let presence_sub = inner
            .services
            .presence
            .subscribe(&inner.room_id, presence_tx)
            .await
            .map_err(|e| SessionError::PresenceUnavailable(e.to_string()))?;

        let signal_sub = inner
            .services
            .relay
            .subscribe(&inner.room_id, &inner.member_id, signal_tx)
            .await
            .map_err(|e| SessionError::RelayUnavailable(e.to_string()))?;

        let tracked = inner
            .services
            .presence
            .track(&inner.room_id, local.clone())
            .await
            .map_err(|e| SessionError::PresenceUnavailable(e.to_string()))?;

        Ok(Feeds {
            presence_rx,
            signal_rx,
            subscriptions: vec![tracked, signal_sub, presence_sub],
        })
    }

    fn leave_requested(&self) -> bool {
        *self.inner.lifecycle.borrow() != Lifecycle::Joining
    }

    async fn wait_closed(&self) {
        let mut rx = self.inner.lifecycle.subscribe();
        let _ = rx.wait_for(|state| *state == Lifecycle::Closed).await;
    }
}

/// Closes the session if a join ends before the loop took ownership, whether
/// by error, cancellation or the join future being dropped.
struct JoinGuard {
    lifecycle: Arc<watch::Sender<Lifecycle>>,
    armed: bool,
}

impl JoinGuard {
    fn new(lifecycle: Arc<watch::Sender<Lifecycle>>) -> Self {
        Self {
            lifecycle,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for JoinGuard {
    fn drop(&mut self) {
        if self.armed {
            self.lifecycle.send_replace(Lifecycle::Closed);
        }
    }
}
