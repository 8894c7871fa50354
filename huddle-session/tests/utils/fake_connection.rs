use anyhow::{Result, bail};
use async_trait::async_trait;
use huddle_core::MemberId;
use huddle_session::{
    ConnectionRequest, PeerConnection, PeerConnectionFactory, Role, TransportEventSender,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Connection double: descriptions are plain text, every call records what it
/// was given.
pub struct FakeConnection {
    pub member_id: MemberId,
    pub role: Role,
    events: TransportEventSender,
    offers_applied: Mutex<Vec<Vec<u8>>>,
    answers_applied: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    fail_signals: bool,
}

impl FakeConnection {
    pub fn offers_applied(&self) -> Vec<Vec<u8>> {
        self.offers_applied.lock().unwrap().clone()
    }

    pub fn answers_applied(&self) -> Vec<Vec<u8>> {
        self.answers_applied.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Report an unrecoverable transport failure, as a dying connection would.
    pub async fn fail(&self, reason: &str) {
        self.events.failed(reason).await;
    }
}

#[async_trait]
impl PeerConnection for FakeConnection {
    async fn create_offer(&self) -> Result<Vec<u8>> {
        if self.fail_signals {
            bail!("offer generation refused");
        }
        Ok(format!("offer for {}", self.member_id).into_bytes())
    }

    async fn accept_offer(&self, offer: Vec<u8>) -> Result<Vec<u8>> {
        if self.fail_signals {
            bail!("offer rejected");
        }
        self.offers_applied.lock().unwrap().push(offer);
        Ok(format!("answer for {}", self.member_id).into_bytes())
    }

    async fn accept_answer(&self, answer: Vec<u8>) -> Result<()> {
        if self.fail_signals {
            bail!("answer rejected");
        }
        self.answers_applied.lock().unwrap().push(answer);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct FactoryInner {
    connections: Mutex<Vec<Arc<FakeConnection>>>,
    refused: Mutex<HashSet<MemberId>>,
    crashing: Mutex<HashSet<MemberId>>,
    fail_signals: AtomicBool,
}

#[derive(Clone, Default)]
pub struct FakeConnectionFactory {
    inner: Arc<FactoryInner>,
}

impl FakeConnectionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to build connections toward `member_id`.
    pub fn refuse(&self, member_id: &str) {
        self.inner
            .refused
            .lock()
            .unwrap()
            .insert(MemberId::from(member_id));
    }

    /// Panic while building a connection toward `member_id`.
    pub fn crash_on(&self, member_id: &str) {
        self.inner
            .crashing
            .lock()
            .unwrap()
            .insert(MemberId::from(member_id));
    }

    /// Make every connection built from now on fail its signaling calls.
    pub fn fail_signals(&self, fail: bool) {
        self.inner.fail_signals.store(fail, Ordering::SeqCst);
    }

    pub fn connections(&self) -> Vec<Arc<FakeConnection>> {
        self.inner.connections.lock().unwrap().clone()
    }

    pub fn connections_to(&self, member_id: &str) -> Vec<Arc<FakeConnection>> {
        let member_id = MemberId::from(member_id);
        self.connections()
            .into_iter()
            .filter(|c| c.member_id == member_id)
            .collect()
    }
}

#[async_trait]
impl PeerConnectionFactory for FakeConnectionFactory {
    async fn connect(&self, request: ConnectionRequest) -> Result<Arc<dyn PeerConnection>> {
        let crash = self.inner.crashing.lock().unwrap().contains(&request.member_id);
        if crash {
            panic!("connection factory crashed on {}", request.member_id);
        }
        if self.inner.refused.lock().unwrap().contains(&request.member_id) {
            bail!("transport refused {}", request.member_id);
        }

        let connection = Arc::new(FakeConnection {
            member_id: request.member_id,
            role: request.role,
            events: request.events,
            offers_applied: Mutex::new(Vec::new()),
            answers_applied: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            fail_signals: self.inner.fail_signals.load(Ordering::SeqCst),
        });
        self.inner.connections.lock().unwrap().push(connection.clone());
        Ok(connection)
    }
}
