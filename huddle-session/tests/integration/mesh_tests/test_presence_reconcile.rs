use crate::integration::init_tracing;
use crate::utils::*;
use huddle_core::{PresenceEvent, SignalKind};
use huddle_session::{Lifecycle, PeerState};
use std::time::Duration;

#[tokio::test]
async fn test_redelivered_join_creates_one_session() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    let bob = mesh.ghost("member-b");

    mesh.inject(PresenceEvent::Join(vec![bob.clone()]));
    mesh.inject(PresenceEvent::Join(vec![bob]));
    mesh.presence.broadcast_sync(&mesh.room_id);

    let view = wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(alice.peers().len(), 1);
    assert_eq!(peer(&view, "member-b").unwrap().display_name, "B");
    assert_eq!(mesh.connections.connections_to("member-b").len(), 1);
    assert_eq!(mesh.sent(SignalKind::Offer, "member-a", "member-b").len(), 1);
}

#[tokio::test]
async fn test_sync_destroys_departed_members() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-b"), mesh.ghost("member-c")]));
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 2).await;

    let me = mesh
        .presence
        .members(&mesh.room_id)
        .into_iter()
        .find(|m| m.member_id.as_str() == "member-a")
        .unwrap();
    mesh.inject(PresenceEvent::Sync(vec![me, mesh.ghost("member-b")]));

    let view = wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 1).await;
    assert!(peer(&view, "member-b").is_some());
    assert!(peer(&view, "member-c").is_none());
    assert_eq!(view.participants.len(), 2);

    let closed = wait_until(VIEW_TIMEOUT_MS, || {
        mesh.connections.connections_to("member-c")[0].is_closed()
    })
    .await;
    assert!(closed);
    assert!(!mesh.connections.connections_to("member-b")[0].is_closed());
}

#[tokio::test]
async fn test_leave_of_unknown_member_is_noop() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-b")]));
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 1).await;

    mesh.inject(PresenceEvent::Leave(vec![mesh.ghost("member-q")]));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(alice.lifecycle(), Lifecycle::Active);
    assert_eq!(alice.peers().len(), 1);
}

#[tokio::test]
async fn test_member_leaving_mid_handshake_is_cleaned_up() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    let mut notifications = alice.notifications();

    // Nobody answers for the ghost, so the session parks in SignalSent.
    mesh.inject(PresenceEvent::Join(vec![mesh.ghost("member-d")]));
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| {
        peer(v, "member-d").is_some_and(|p| p.state == PeerState::SignalSent)
    })
    .await;

    mesh.inject(PresenceEvent::Leave(vec![mesh.ghost("member-d")]));

    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.is_empty()).await;
    assert!(notifications.try_recv().is_err());
    let closed = wait_until(VIEW_TIMEOUT_MS, || {
        mesh.connections.connections_to("member-d")[0].is_closed()
    })
    .await;
    assert!(closed);
}

#[tokio::test]
async fn test_local_member_never_becomes_a_peer() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;

    mesh.presence.broadcast_sync(&mesh.room_id);
    let view = wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.participants.len() == 1).await;

    assert!(view.peers.is_empty());
    assert!(mesh.connections.connections().is_empty());
}
