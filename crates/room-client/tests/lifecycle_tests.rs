//! Tests for the connection lifecycle.
//!
//! Uses tokio's paused clock where time matters:
//! - Close grace delay before signaling is closed
//! - Notice expiry
//!
//! Reconnect tests verify that every listener of a connection cycle is
//! torn down, so nothing is delivered or published twice.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use room_client::errors::{RoomError, SignalingError};
use room_client::events::{NoticeLevel, RoomState, StateUpdate};
use room_client::media::{MediaKind, Originator};
use room_client::preferences::{PreferenceStore, Preferences};
use room_client::signaling::METHOD_CHANGE_DISPLAY_NAME;
use room_test_utils::*;
use serde_json::json;

fn peer_with_media(name: &str, display_name: &str) -> Arc<MockPeer> {
    Arc::new(
        MockPeer::new(name, display_name)
            .with_consumer(MockConsumer::new(
                format!("{name}-audio"),
                name,
                MediaKind::Audio,
            ))
            .with_consumer(MockConsumer::new(
                format!("{name}-video"),
                name,
                MediaKind::Video,
            )),
    )
}

async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..100 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met in time");
}

fn total_received(room: &TestRoom) -> usize {
    room.media
        .transports()
        .iter()
        .map(|transport| transport.received().len())
        .sum()
}

fn room_with_peer(peer: &Arc<MockPeer>) -> TestRoom {
    let room = TestRoom::builder()
        .devices(MockDevices::builder().with_webcam("cam-0", "Front").build())
        .build();
    room.media.set_peers(vec![Arc::clone(peer)]);
    room
}

// ============================================================================
// Close
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_is_idempotent_and_delays_signaling_close() {
    let room = TestRoom::builder()
        .devices(MockDevices::builder().with_webcam("cam-0", "Front").build())
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    handle.close().await.unwrap();
    assert!(handle.is_closed());
    assert_eq!(room.media.leave_count(), 1);
    assert_eq!(room.signaling.close_count(), 0);

    // Signaling closes only after the grace delay.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(room.signaling.close_count(), 1);

    handle.close().await.unwrap();
    assert_eq!(room.media.leave_count(), 1);
    assert_eq!(room.signaling.close_count(), 1);
    assert_eq!(
        room.sink
            .room_states()
            .iter()
            .filter(|s| **s == RoomState::Closed)
            .count(),
        1
    );

    assert!(room.media.transports().iter().all(|t| t.is_closed()));
    assert!(room.media.producers().iter().all(|p| p.is_closed()));
    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::ProducerClosed { .. })),
        2
    );
}

#[tokio::test]
async fn test_operations_after_close_fail_fast_and_publish_nothing() {
    let room = TestRoom::builder().build();
    let handle = room.spawn_joined(test_config("room-1")).await;
    handle.close().await.unwrap();
    let published = room.sink.updates().len();

    assert!(matches!(handle.mute_mic().await, Err(RoomError::Closed)));
    assert!(matches!(handle.unmute_mic().await, Err(RoomError::Closed)));
    assert!(matches!(handle.add_webcam().await, Err(RoomError::Closed)));
    assert!(matches!(handle.remove_webcam().await, Err(RoomError::Closed)));
    assert!(matches!(
        handle.cycle_webcam_device().await,
        Err(RoomError::Closed)
    ));
    assert!(matches!(
        handle.cycle_webcam_resolution().await,
        Err(RoomError::Closed)
    ));
    assert!(matches!(
        handle.enable_audio_only().await,
        Err(RoomError::Closed)
    ));
    assert!(matches!(
        handle.set_display_name("Late").await,
        Err(RoomError::Closed)
    ));

    assert_eq!(room.sink.updates().len(), published);
    assert!(room.signaling.sent_with_method(METHOD_CHANGE_DISPLAY_NAME).is_empty());

    // The snapshot is still available.
    assert_eq!(handle.get_state().await.unwrap().state, RoomState::Closed);
}

#[tokio::test]
async fn test_close_before_open_prevents_join() {
    let room = TestRoom::builder()
        .signaling(MockSignaling::builder().manual_open().build())
        .build();
    let (handle, _task) = room.spawn(test_config("room-1"));
    room.sink.wait_for_state(RoomState::Connecting, 1).await;

    handle.close().await.unwrap();
    room.signaling.emit_open();
    handle.get_state().await.unwrap();

    assert_eq!(room.media.join_count(), 0);
    assert_eq!(
        room.sink.room_states(),
        vec![RoomState::Connecting, RoomState::Closed]
    );
}

#[tokio::test]
async fn test_cancel_closes_session() {
    let room = TestRoom::builder().build();
    let (handle, task) = room.spawn(test_config("room-1"));
    room.sink.wait_for_state(RoomState::Connected, 1).await;

    handle.cancel();
    task.await.unwrap();

    assert!(handle.is_closed());
    assert_eq!(room.media.leave_count(), 1);
    assert!(matches!(handle.mute_mic().await, Err(RoomError::Closed)));
}

// ============================================================================
// Reconnect
// ============================================================================

#[tokio::test]
async fn test_disconnect_tears_down_and_returns_to_connecting() {
    let alice = peer_with_media("alice", "Alice");
    let room = room_with_peer(&alice);
    let _handle = room.spawn_joined(test_config("room-1")).await;

    room.signaling.emit_disconnected();
    room.sink.wait_for_state(RoomState::Connecting, 2).await;

    assert!(room
        .sink
        .error_notices()
        .contains(&"Connection lost, reconnecting".to_string()));
    assert_eq!(room.media.remote_close_count(), 1);
    assert_eq!(room.media.listener_count(), 0);
    assert_eq!(alice.listener_count(), 0);
    assert!(alice.mock_consumers().iter().all(|c| c.listener_count() == 0));
    assert!(room.media.producers().iter().all(|p| p.is_closed()));
    assert!(room.media.transports().iter().all(|t| t.is_closed()));
}

#[tokio::test]
async fn test_reconnect_does_not_duplicate_peers_or_listeners() {
    let alice = peer_with_media("alice", "Alice");
    let room = room_with_peer(&alice);
    let handle = room.spawn_joined(test_config("room-1")).await;
    room.sink
        .wait_for_count(2, |u| matches!(u, StateUpdate::ConsumerTrack { .. }))
        .await;

    room.signaling.emit_disconnected();
    room.sink.wait_for_state(RoomState::Connecting, 2).await;
    room.signaling.emit_open();
    room.sink.wait_for_state(RoomState::Connected, 2).await;

    // Both consumers are received again on the new transport, but their
    // tracks are unchanged and not republished.
    eventually(|| total_received(&room) == 4).await;
    handle.get_state().await.unwrap();

    assert_eq!(room.media.join_count(), 2);
    assert_eq!(room.sink.count(|u| matches!(u, StateUpdate::NewPeer(_))), 1);
    assert_eq!(
        room.sink.count(|u| matches!(u, StateUpdate::NewConsumer(_))),
        2
    );
    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::ConsumerTrack { .. })),
        2
    );

    // Exactly one listener per collaborator object after rejoining.
    assert_eq!(room.media.listener_count(), 1);
    assert_eq!(alice.listener_count(), 1);
    assert!(alice.mock_consumers().iter().all(|c| c.listener_count() == 1));

    // Producers were recreated on the new transports.
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.producers.len(), 2);
    assert_eq!(room.media.producers().len(), 4);
    assert_eq!(state.peers.len(), 1);
    assert_eq!(state.consumers.len(), 2);

    // Peer events are delivered once.
    alice.close();
    room.sink
        .wait_for(|u| matches!(u, StateUpdate::PeerClosed { .. }))
        .await;
    handle.get_state().await.unwrap();
    assert_eq!(
        room.sink.count(|u| matches!(u, StateUpdate::PeerClosed { .. })),
        1
    );
    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::ConsumerClosed { .. })),
        2
    );
    assert_eq!(
        room.sink
            .notices()
            .iter()
            .filter(|n| n.text == "Alice left the room")
            .count(),
        1
    );
}

#[tokio::test]
async fn test_consumer_paused_during_reconnect_is_reported_on_rejoin() {
    let alice = peer_with_media("alice", "Alice");
    let room = room_with_peer(&alice);
    let handle = room.spawn_joined(test_config("room-1")).await;
    room.sink
        .wait_for_count(2, |u| matches!(u, StateUpdate::ConsumerTrack { .. }))
        .await;

    room.signaling.emit_disconnected();
    room.sink.wait_for_state(RoomState::Connecting, 2).await;
    // The server pauses the stream while no observer is attached.
    alice.mock_consumers()[1].remote_pause();
    room.signaling.emit_open();
    room.sink.wait_for_state(RoomState::Connected, 2).await;

    let state = handle.get_state().await.unwrap();
    let video = state
        .consumers
        .iter()
        .find(|c| c.id.as_str() == "alice-video")
        .unwrap();
    assert!(video.remotely_paused);
    assert!(!video.locally_paused);
    assert!(!video.is_live());

    let paused: Vec<StateUpdate> = room
        .sink
        .updates()
        .into_iter()
        .filter(|u| matches!(u, StateUpdate::ConsumerPaused { .. }))
        .collect();
    assert_eq!(paused.len(), 1);
    assert!(matches!(
        &paused[0],
        StateUpdate::ConsumerPaused { consumer_id, originator: Originator::Remote }
            if consumer_id.as_str() == "alice-video"
    ));
}

#[tokio::test]
async fn test_peers_missing_after_reconnect_are_closed() {
    let alice = peer_with_media("alice", "Alice");
    let room = room_with_peer(&alice);
    let handle = room.spawn_joined(test_config("room-1")).await;

    room.signaling.emit_disconnected();
    room.sink.wait_for_state(RoomState::Connecting, 2).await;
    room.media.set_peers(Vec::new());
    room.signaling.emit_open();
    room.sink.wait_for_state(RoomState::Connected, 2).await;

    let state = handle.get_state().await.unwrap();
    assert!(state.peers.is_empty());
    assert!(state.consumers.is_empty());
    assert_eq!(
        room.sink.count(|u| matches!(u, StateUpdate::PeerClosed { .. })),
        1
    );
    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::ConsumerClosed { .. })),
        2
    );
}

#[tokio::test]
async fn test_events_during_reconnect_are_not_delivered() {
    let alice = peer_with_media("alice", "Alice");
    let room = room_with_peer(&alice);
    let handle = room.spawn_joined(test_config("room-1")).await;

    room.signaling.emit_disconnected();
    room.sink.wait_for_state(RoomState::Connecting, 2).await;

    alice.mock_consumers()[0].remote_pause();
    alice.close();
    handle.get_state().await.unwrap();

    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::ConsumerPaused { .. })),
        0
    );
    assert_eq!(
        room.sink.count(|u| matches!(u, StateUpdate::PeerClosed { .. })),
        0
    );
}

#[tokio::test]
async fn test_disconnect_before_open_is_ignored() {
    let room = TestRoom::builder()
        .signaling(MockSignaling::builder().manual_open().build())
        .build();
    let (handle, _task) = room.spawn(test_config("room-1"));
    room.sink.wait_for_state(RoomState::Connecting, 1).await;

    room.signaling.emit_disconnected();
    handle.get_state().await.unwrap();
    assert!(room.sink.error_notices().is_empty());
    assert_eq!(room.media.remote_close_count(), 0);

    room.signaling.emit_open();
    room.sink.wait_for_state(RoomState::Connected, 1).await;
}

// ============================================================================
// Notices
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_notices_expire_after_their_timeout() {
    // No webcams: the join also shows one error notice.
    let room = TestRoom::builder().build();
    let _handle = room.spawn_joined(test_config("room-1")).await;

    let welcome = room
        .sink
        .notices()
        .into_iter()
        .find(|n| n.text == "You are in the room")
        .unwrap();
    assert_eq!(welcome.level, NoticeLevel::Info);
    assert_eq!(welcome.timeout_ms, 3000);

    tokio::time::sleep(Duration::from_millis(3100)).await;
    room.sink
        .wait_for(|u| matches!(u, StateUpdate::RemoveNotification { id } if *id == welcome.id))
        .await;
    // The error notice lives longer.
    assert_eq!(
        room.sink
            .count(|u| matches!(u, StateUpdate::RemoveNotification { .. })),
        1
    );

    tokio::time::sleep(Duration::from_millis(2000)).await;
    room.sink
        .wait_for_count(2, |u| matches!(u, StateUpdate::RemoveNotification { .. }))
        .await;
}

// ============================================================================
// Display name
// ============================================================================

#[tokio::test]
async fn test_display_name_change() {
    let room = TestRoom::builder().build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    handle.set_display_name("Alice").await.unwrap();

    let sent = room.signaling.sent_with_method(METHOD_CHANGE_DISPLAY_NAME);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].data, json!({ "displayName": "Alice" }));
    assert_eq!(handle.get_state().await.unwrap().display_name, "Alice");
    assert_eq!(
        room.preferences.load().unwrap().display_name.as_deref(),
        Some("Alice")
    );
    assert!(room
        .sink
        .notices()
        .iter()
        .any(|n| n.text == "Display name changed"));
}

#[tokio::test]
async fn test_display_name_failure_reverts() {
    let room = TestRoom::builder().build();
    let handle = room.spawn_joined(test_config("room-1")).await;
    room.signaling
        .set_failure(METHOD_CHANGE_DISPLAY_NAME, SignalingError::Timeout);

    let err = handle.set_display_name("Alice").await.unwrap_err();
    assert!(matches!(err, RoomError::Signaling(_)));

    assert_eq!(handle.get_state().await.unwrap().display_name, "Tester");
    let last_name = room
        .sink
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            StateUpdate::DisplayName { display_name } => Some(display_name),
            _ => None,
        })
        .last();
    assert_eq!(last_name.as_deref(), Some("Tester"));
    assert_eq!(
        room.sink
            .error_notices()
            .iter()
            .filter(|text| text.starts_with("Could not change display name"))
            .count(),
        1
    );
    assert!(room.preferences.load().unwrap().display_name.is_none());
}

#[tokio::test]
async fn test_display_name_defaults_to_stored_preference() {
    let room = TestRoom::builder()
        .preferences(Preferences {
            display_name: Some("Stored".to_string()),
            webcam_enabled: true,
        })
        .build();
    let mut config = test_config("room-1");
    config.display_name = None;

    let handle = room.spawn_joined(config).await;
    assert_eq!(room.media.joined_as(), vec!["Stored".to_string()]);
    assert_eq!(handle.get_state().await.unwrap().display_name, "Stored");
}

#[tokio::test]
async fn test_mailbox_counts_processed_messages() {
    let room = TestRoom::builder().build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    handle.get_state().await.unwrap();
    handle.get_state().await.unwrap();

    assert!(handle.mailbox().messages_processed() >= 3);
    assert_eq!(handle.mailbox().current_depth(), 0);
}

#[tokio::test]
async fn test_request_to_stopped_controller_leaves_mailbox_depth_unchanged() {
    let room = TestRoom::builder().build();
    let (handle, task) = room.spawn(test_config("room-1"));
    room.sink.wait_for_state(RoomState::Connected, 1).await;

    handle.cancel();
    task.await.unwrap();

    let depth = handle.mailbox().current_depth();
    assert!(matches!(
        handle.get_state().await,
        Err(RoomError::Internal(_))
    ));
    assert_eq!(handle.mailbox().current_depth(), depth);
}
