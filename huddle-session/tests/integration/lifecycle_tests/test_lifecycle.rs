use crate::integration::init_tracing;
use crate::utils::*;
use huddle_core::RoomId;
use huddle_session::{Lifecycle, RoomSessionController, SessionError, SessionServices};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_join_activates_and_attaches_feeds() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.member("member-a");
    assert_eq!(alice.lifecycle(), Lifecycle::Idle);

    alice.join().await.unwrap();

    assert_eq!(alice.lifecycle(), Lifecycle::Active);
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 1);
    assert_eq!(mesh.relay.subscriber_count(&mesh.room_id, alice.member_id()), 1);
    assert_eq!(mesh.presence.members(&mesh.room_id).len(), 1);
    assert_eq!(mesh.directory.participants(&mesh.room_id), 1);

    let view = wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.participants.len() == 1).await;
    assert!(view.peers.is_empty());
}

#[tokio::test]
async fn test_join_twice_is_noop_when_active() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;

    alice.join().await.unwrap();

    assert_eq!(mesh.directory.participants(&mesh.room_id), 1);
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 1);
}

#[tokio::test]
async fn test_leave_releases_everything() {
    init_tracing();
    let mesh = TestMesh::new();
    let media = FakeMediaSource::new(AcquireMode::Immediate);
    let alice = mesh.member_with_media("member-a", media.clone());
    alice.join().await.unwrap();
    mesh.inject(huddle_core::PresenceEvent::Join(vec![mesh.ghost("member-b")]));
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 1).await;

    alice.leave().await;

    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);
    assert_eq!(mesh.relay.subscriber_count(&mesh.room_id, alice.member_id()), 0);
    assert!(mesh.presence.members(&mesh.room_id).is_empty());
    assert_eq!(mesh.directory.participants(&mesh.room_id), 0);
    assert!(media.all_stopped());
    assert!(alice.peers().is_empty());

    let closed = wait_until(VIEW_TIMEOUT_MS, || {
        mesh.connections.connections_to("member-b").iter().all(|c| c.is_closed())
    })
    .await;
    assert!(closed, "peer connection should be closed on leave");
}

#[tokio::test]
async fn test_leave_is_idempotent() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.joined("member-a").await;
    let _bob = mesh.joined("member-b").await;
    assert_eq!(mesh.directory.participants(&mesh.room_id), 2);

    alice.leave().await;
    alice.leave().await;

    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(mesh.directory.participants(&mesh.room_id), 1);
}

#[tokio::test]
async fn test_leave_before_join_closes() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.member("member-a");

    alice.leave().await;

    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(
        alice.join().await,
        Err(SessionError::InvalidLifecycle(Lifecycle::Closed))
    );
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);
}

#[tokio::test]
async fn test_media_denied_leaves_nothing_behind() {
    init_tracing();
    let mesh = TestMesh::new();
    let alice = mesh.member_with_media("member-a", FakeMediaSource::new(AcquireMode::Denied));

    let result = alice.join().await;

    assert!(matches!(result, Err(SessionError::MediaUnavailable(_))));
    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);
    assert_eq!(mesh.relay.subscriber_count(&mesh.room_id, alice.member_id()), 0);
    assert!(mesh.presence.members(&mesh.room_id).is_empty());
    assert_eq!(mesh.directory.participants(&mesh.room_id), 0);
}

#[tokio::test]
async fn test_presence_unavailable_stops_media() {
    init_tracing();
    let mesh = TestMesh::new();
    let media = FakeMediaSource::new(AcquireMode::Immediate);
    let services = SessionServices {
        presence: Arc::new(UnreachablePresence),
        ..mesh.services(media.clone())
    };
    let alice = RoomSessionController::new(
        RoomId::from("room-1"),
        "member-a".into(),
        "A",
        services,
        mesh.config.clone(),
    );

    let result = alice.join().await;

    assert!(matches!(result, Err(SessionError::PresenceUnavailable(_))));
    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert!(media.all_stopped());
    assert_eq!(mesh.relay.subscriber_count(&mesh.room_id, alice.member_id()), 0);
}

#[tokio::test]
async fn test_leave_during_media_acquisition_cancels_join() {
    init_tracing();
    let mesh = TestMesh::new();
    let media = FakeMediaSource::new(AcquireMode::Deferred);
    let alice = mesh.member_with_media("member-a", media.clone());

    let joining = tokio::spawn({
        let alice = alice.clone();
        async move { alice.join().await }
    });
    let mut lifecycle = alice.subscribe_lifecycle();
    lifecycle
        .wait_for(|s| *s == Lifecycle::Joining)
        .await
        .unwrap();

    let leaving = tokio::spawn({
        let alice = alice.clone();
        async move { alice.leave().await }
    });
    lifecycle
        .wait_for(|s| *s == Lifecycle::Leaving)
        .await
        .unwrap();

    media.grant();

    assert_eq!(joining.await.unwrap(), Err(SessionError::JoinCancelled));
    leaving.await.unwrap();
    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(media.acquired().len(), 1);
    assert!(media.all_stopped());
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);
    assert!(mesh.presence.members(&mesh.room_id).is_empty());
    assert_eq!(mesh.directory.participants(&mesh.room_id), 0);
}

#[tokio::test]
async fn test_dropping_controller_tears_session_down() {
    init_tracing();
    let mesh = TestMesh::new();
    let media = FakeMediaSource::new(AcquireMode::Immediate);
    let alice = mesh.member_with_media("member-a", media.clone());
    alice.join().await.unwrap();
    let mut lifecycle = alice.subscribe_lifecycle();

    drop(alice);

    tokio::time::timeout(
        Duration::from_millis(VIEW_TIMEOUT_MS),
        lifecycle.wait_for(|s| *s == Lifecycle::Closed),
    )
    .await
    .expect("session never closed")
    .unwrap();
    assert!(media.all_stopped());
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);
    assert_eq!(mesh.directory.participants(&mesh.room_id), 0);
}

#[tokio::test]
async fn test_zero_signal_grace_still_leaves_cleanly() {
    init_tracing();
    let mesh = TestMesh::with_config(huddle_session::SessionConfig {
        ice_servers: vec![],
        signal_grace_ms: 0,
        ..huddle_session::SessionConfig::default()
    });
    let alice = mesh.joined("member-a").await;
    let _bob = mesh.joined("member-b").await;
    wait_for_view(&alice, VIEW_TIMEOUT_MS, |v| v.peers.len() == 1).await;

    tokio::time::timeout(Duration::from_millis(VIEW_TIMEOUT_MS), alice.leave())
        .await
        .expect("leave never completed");

    assert_eq!(alice.lifecycle(), Lifecycle::Closed);
    assert_eq!(mesh.directory.participants(&mesh.room_id), 1);
}

#[tokio::test]
async fn test_crashed_session_loop_still_closes() {
    init_tracing();
    let mesh = TestMesh::new();
    let media = FakeMediaSource::new(AcquireMode::Immediate);
    let alice = mesh.member_with_media("member-a", media.clone());
    alice.join().await.unwrap();
    mesh.connections.crash_on("member-b");

    mesh.inject(huddle_core::PresenceEvent::Join(vec![mesh.ghost("member-b")]));

    let mut lifecycle = alice.subscribe_lifecycle();
    tokio::time::timeout(
        Duration::from_millis(VIEW_TIMEOUT_MS),
        lifecycle.wait_for(|s| *s == Lifecycle::Closed),
    )
    .await
    .expect("session never closed")
    .unwrap();
    assert!(media.all_stopped());
    assert_eq!(mesh.presence.subscriber_count(&mesh.room_id), 0);

    tokio::time::timeout(Duration::from_millis(VIEW_TIMEOUT_MS), alice.leave())
        .await
        .expect("leave never completed");
}
