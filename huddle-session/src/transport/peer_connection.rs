use crate::media::{LocalMedia, RemoteMediaSink};
use crate::peer::Role;
use crate::transport::TransportEventSender;
use async_trait::async_trait;
use huddle_core::MemberId;
use std::sync::Arc;

/// Capability interface over the underlying real-time transport.
///
/// Payloads are opaque to the session layer. Every call may suspend on
/// network work; callers run them off the event-processing path.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    /// Initiator side: produce the offer to send to the remote member.
    async fn create_offer(&self) -> anyhow::Result<Vec<u8>>;

    /// Responder side: apply the remote offer and produce the answer.
    async fn accept_offer(&self, offer: Vec<u8>) -> anyhow::Result<Vec<u8>>;

    /// Initiator side: apply the remote answer.
    async fn accept_answer(&self, answer: Vec<u8>) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Everything a factory needs to build one connection.
pub struct ConnectionRequest {
    pub member_id: MemberId,
    pub role: Role,
    pub media: Arc<LocalMedia>,
    pub remote_media: RemoteMediaSink,
    pub events: TransportEventSender,
}

#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn connect(&self, request: ConnectionRequest) -> anyhow::Result<Arc<dyn PeerConnection>>;
}
