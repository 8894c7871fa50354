use crate::integration::init_tracing;
use crate::utils::*;
use huddle_core::{PresenceEvent, SignalKind};
use huddle_session::{PeerState, SessionConfig};
use std::time::Duration;

fn short_grace() -> SessionConfig {
    SessionConfig {
        ice_servers: vec![],
        signal_grace_ms: 200,
        max_pending_per_peer: 2,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn test_offer_before_presence_is_replayed() {
    init_tracing();
    let mesh = TestMesh::new();
    let mia = mesh.joined("member-m").await;

    assert_eq!(mesh.relay.deliver(mesh.offer("member-e", "member-m")), 1);
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| v.pending_signals == 1).await;

    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-e")]));

    let view = wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-e").is_some_and(|p| p.state == PeerState::Connected)
    })
    .await;
    assert_eq!(view.pending_signals, 0);
    assert_eq!(mesh.sent(SignalKind::Answer, "member-m", "member-e").len(), 1);
    assert_eq!(
        mesh.connections.connections_to("member-e")[0].offers_applied(),
        vec![b"offer from member-e".to_vec()]
    );
}

#[tokio::test]
async fn test_buffered_offer_expires_after_grace() {
    init_tracing();
    let mesh = TestMesh::with_config(short_grace());
    let mia = mesh.joined("member-m").await;

    mesh.relay.deliver(mesh.offer("member-e", "member-m"));
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| v.pending_signals == 1).await;
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| v.pending_signals == 0).await;

    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-e")]));
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| peer(v, "member-e").is_some()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let view = mia.view();
    assert_eq!(peer(&view, "member-e").unwrap().state, PeerState::AwaitingLocalSignal);
    assert!(mesh.sent(SignalKind::Answer, "member-m", "member-e").is_empty());
}

#[tokio::test]
async fn test_pending_queue_is_capped_per_sender() {
    init_tracing();
    let mesh = TestMesh::with_config(SessionConfig {
        signal_grace_ms: 10_000,
        ..short_grace()
    });
    let mia = mesh.joined("member-m").await;

    for _ in 0..3 {
        mesh.relay.deliver(mesh.offer("member-e", "member-m"));
    }
    mesh.relay.deliver(mesh.offer("member-f", "member-m"));

    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| v.pending_signals == 3).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(mia.view().pending_signals, 3);
}

#[tokio::test]
async fn test_offer_from_higher_member_is_dropped() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-z")]));
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-z").is_some_and(|p| p.state == PeerState::SignalSent)
    })
    .await;

    mesh.relay.deliver(mesh.offer("member-z", "member-a"));
    mesh.relay.deliver(mesh.offer("member-y", "member-a"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let view = alice.view();
    assert_eq!(view.pending_signals, 0);
    assert_eq!(peer(&view, "member-z").unwrap().state, PeerState::SignalSent);
    assert!(mesh.connections.connections_to("member-z")[0].offers_applied().is_empty());
}

#[tokio::test]
async fn test_new_offer_ahead_of_rejoin_is_replayed() {
    init_tracing();
    let mesh = TestMesh::new();
    let mia = mesh.joined("member-m").await;
    mesh.relay.deliver(mesh.offer("member-e", "member-m"));
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-e")]));
    let first = wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-e").is_some_and(|p| p.state == PeerState::Connected)
    })
    .await;
    let first_id = peer(&first, "member-e").unwrap().session_id;

    // The member restarted: its new offer races ahead of the presence churn.
    let restarted = b"offer from restarted member-e".to_vec();
    mesh.relay
        .deliver(mesh.offer_with("member-e", "member-m", restarted.clone()));
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| v.pending_signals == 1).await;
    assert_eq!(
        peer(&mia.view(), "member-e").unwrap().session_id,
        first_id
    );

    mesh.inject(PresenceEvent::Leave(vec![mesh.ghost("member-e")]));
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-e")]));

    let view = wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-e").is_some_and(|p| p.session_id != first_id && p.state == PeerState::Connected)
    })
    .await;
    assert_eq!(view.pending_signals, 0);
    assert_eq!(mesh.sent(SignalKind::Answer, "member-m", "member-e").len(), 2);
    let to_e = mesh.connections.connections_to("member-e");
    assert_eq!(to_e.len(), 2);
    assert_eq!(to_e[1].offers_applied(), vec![restarted]);
}

#[tokio::test]
async fn test_repeated_offer_to_connected_session_is_not_held() {
    init_tracing();
    let mesh = TestMesh::new();
    let mia = mesh.joined("member-m").await;
    mesh.relay.deliver(mesh.offer("member-e", "member-m"));
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-e")]));
    wait_for_view(&mia, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-e").is_some_and(|p| p.state == PeerState::Connected)
    })
    .await;

    mesh.relay.deliver(mesh.offer("member-e", "member-m"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(mia.view().pending_signals, 0);
    assert_eq!(mesh.connections.connections_to("member-e")[0].offers_applied().len(), 1);
}
