use crate::peer::SessionId;
use huddle_core::{MemberId, SignalKind};
use tokio::sync::mpsc;

/// Events a connection reports back into the owning session loop.
///
/// Every event carries the [`SessionId`] it was produced for, so reports from
/// a session that has since been destroyed are recognised and dropped.
#[derive(Debug)]
pub enum TransportEvent {
    /// A local description is ready and must be relayed to the member.
    LocalSignal {
        member_id: MemberId,
        session_id: SessionId,
        kind: SignalKind,
        payload: Vec<u8>,
    },

    /// The remote answer was applied on the initiating side.
    RemoteSignalApplied {
        member_id: MemberId,
        session_id: SessionId,
    },

    /// Media path is up.
    Connected {
        member_id: MemberId,
        session_id: SessionId,
    },

    /// Unrecoverable failure of this one connection.
    Failed {
        member_id: MemberId,
        session_id: SessionId,
        reason: String,
    },
}

/// Sender handed to a connection, pre-bound to its member and session.
#[derive(Clone, Debug)]
pub struct TransportEventSender {
    tx: mpsc::Sender<TransportEvent>,
    member_id: MemberId,
    session_id: SessionId,
}

impl TransportEventSender {
    pub(crate) fn new(
        tx: mpsc::Sender<TransportEvent>,
        member_id: MemberId,
        session_id: SessionId,
    ) -> Self {
        Self {
            tx,
            member_id,
            session_id,
        }
    }

    pub fn member_id(&self) -> &MemberId {
        &self.member_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub async fn connected(&self) {
        self.emit(TransportEvent::Connected {
            member_id: self.member_id.clone(),
            session_id: self.session_id,
        })
        .await;
    }

    pub async fn failed(&self, reason: impl Into<String>) {
        self.emit(TransportEvent::Failed {
            member_id: self.member_id.clone(),
            session_id: self.session_id,
            reason: reason.into(),
        })
        .await;
    }

    pub(crate) async fn local_signal(&self, kind: SignalKind, payload: Vec<u8>) {
        self.emit(TransportEvent::LocalSignal {
            member_id: self.member_id.clone(),
            session_id: self.session_id,
            kind,
            payload,
        })
        .await;
    }

    pub(crate) async fn remote_applied(&self) {
        self.emit(TransportEvent::RemoteSignalApplied {
            member_id: self.member_id.clone(),
            session_id: self.session_id,
        })
        .await;
    }

    async fn emit(&self, event: TransportEvent) {
        // The loop is gone once the room session closed; nothing left to notify.
        let _ = self.tx.send(event).await;
    }
}
