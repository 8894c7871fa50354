use crate::config::SessionConfig;
use crate::media::{RemoteTrack, TrackKind};
use crate::transport::{ConnectionRequest, PeerConnection, PeerConnectionFactory};
use anyhow::{Context, Result};
use async_trait::async_trait;
use huddle_core::{IceServerConfig, MemberId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

/// Builds [`WebRtcConnection`]s with a fixed STUN/TURN configuration.
#[derive(Clone)]
pub struct WebRtcConnectionFactory {
    ice_servers: Vec<IceServerConfig>,
    gathering_timeout: Duration,
}

impl WebRtcConnectionFactory {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            ice_servers: config.ice_servers.clone(),
            gathering_timeout: config.ice_gathering_timeout(),
        }
    }
}

#[async_trait]
impl PeerConnectionFactory for WebRtcConnectionFactory {
    async fn connect(&self, request: ConnectionRequest) -> Result<Arc<dyn PeerConnection>> {
        let connection =
            WebRtcConnection::new(request, &self.ice_servers, self.gathering_timeout).await?;
        Ok(Arc::new(connection))
    }
}

/// One webrtc-rs peer connection carrying the local tracks.
///
/// Signaling is non-trickle: a description is only handed out once local
/// candidate gathering finished (or timed out), so it embeds every candidate.
pub struct WebRtcConnection {
    member_id: MemberId,
    peer_connection: Arc<RTCPeerConnection>,
    gathering_timeout: Duration,
}

impl WebRtcConnection {
    pub async fn new(
        request: ConnectionRequest,
        ice_servers: &[IceServerConfig],
        gathering_timeout: Duration,
    ) -> Result<Self> {
        let ConnectionRequest {
            member_id,
            role,
            media,
            remote_media,
            events,
        } = request;

        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        for local in media.tracks() {
            let rtp_sender = peer_connection
                .add_track(local.track() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .with_context(|| format!("failed to add local {:?} track", local.kind()))?;

            // RTCP has to be drained for the interceptors to make progress.
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while let Ok((_, _)) = rtp_sender.read(&mut rtcp_buf).await {}
            });
        }

        let state_events = events.clone();
        let uid_state = member_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    debug!("Peer connection state for {}: {:?}", uid, s);
                    match s {
                        RTCPeerConnectionState::Connected => events.connected().await,
                        RTCPeerConnectionState::Failed | RTCPeerConnectionState::Closed => {
                            events.failed(format!("peer connection {}", s)).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        let uid_track = member_id.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let sink = remote_media.clone();
            let uid = uid_track.clone();

            Box::pin(async move {
                let kind = match track.kind() {
                    RTPCodecType::Video => TrackKind::Video,
                    _ => TrackKind::Audio,
                };
                info!("Received remote {:?} track from {}", kind, uid);
                sink.publish(RemoteTrack {
                    kind,
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                });
            })
        }));

        debug!("Created {:?} connection toward {}", role, member_id);

        Ok(Self {
            member_id,
            peer_connection,
            gathering_timeout,
        })
    }

    async fn complete_local_description(&self, description: RTCSessionDescription) -> Result<Vec<u8>> {
        let mut gathering_complete = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection
            .set_local_description(description)
            .await?;

        if tokio::time::timeout(self.gathering_timeout, gathering_complete.recv())
            .await
            .is_err()
        {
            warn!(
                "ICE gathering toward {} timed out, sending partial description",
                self.member_id
            );
        }

        let local = self
            .peer_connection
            .local_description()
            .await
            .context("local description missing after gathering")?;
        Ok(serde_json::to_vec(&local)?)
    }
}

#[async_trait]
impl PeerConnection for WebRtcConnection {
    async fn create_offer(&self) -> Result<Vec<u8>> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.complete_local_description(offer).await
    }

    async fn accept_offer(&self, offer: Vec<u8>) -> Result<Vec<u8>> {
        let offer: RTCSessionDescription =
            serde_json::from_slice(&offer).context("offer payload is not a session description")?;
        self.peer_connection.set_remote_description(offer).await?;

        let answer = self.peer_connection.create_answer(None).await?;
        self.complete_local_description(answer).await
    }

    async fn accept_answer(&self, answer: Vec<u8>) -> Result<()> {
        let answer: RTCSessionDescription = serde_json::from_slice(&answer)
            .context("answer payload is not a session description")?;
        self.peer_connection.set_remote_description(answer).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
