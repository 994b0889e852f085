//! Tests for webcam device and resolution cycling, producer uniqueness and
//! audio-only mode.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use room_client::devices::{CaptureRequest, ResolutionTier};
use room_client::errors::{DeviceError, RoomError};
use room_client::events::StateUpdate;
use room_client::media::{Consumer, MediaKind, Producer};
use room_client::preferences::{PreferenceStore, Preferences};
use room_test_utils::*;

fn two_webcams() -> MockDevices {
    MockDevices::builder()
        .with_webcam("cam-0", "Front Camera")
        .with_webcam("cam-1", "Back Camera")
        .build()
}

/// Room joined with the webcam preference off, so the test adds it.
async fn joined_without_webcam(devices: MockDevices) -> (TestRoom, room_client::RoomControllerHandle) {
    let room = TestRoom::builder()
        .devices(devices)
        .preferences(Preferences {
            display_name: None,
            webcam_enabled: false,
        })
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;
    (room, handle)
}

#[tokio::test]
async fn test_webcam_scenario_add_cycle_remove() {
    let (room, handle) = joined_without_webcam(two_webcams()).await;

    // Add: first device at the default tier.
    handle.add_webcam().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.webcam.device.as_ref().unwrap().device_id, "cam-0");
    assert_eq!(state.webcam.resolution, ResolutionTier::Vga);
    let webcam = state.producer(MediaKind::Video).unwrap().clone();
    assert_eq!(webcam.track.as_ref().unwrap().width, Some(640));
    assert!(state.can_change_webcam);

    // Cycle device: next device, tier reset to vga, same producer.
    handle.cycle_webcam_device().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.webcam.device.as_ref().unwrap().device_id, "cam-1");
    assert_eq!(state.webcam.resolution, ResolutionTier::Vga);
    let after_switch = state.producer(MediaKind::Video).unwrap();
    assert_eq!(after_switch.id, webcam.id);
    assert_eq!(
        after_switch.track.as_ref().unwrap().device_id.as_deref(),
        Some("cam-1")
    );
    assert_eq!(after_switch.device_label.as_deref(), Some("Back Camera"));

    // Cycle resolution: vga -> hd.
    handle.cycle_webcam_resolution().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.webcam.resolution, ResolutionTier::Hd);
    assert_eq!(
        state
            .producer(MediaKind::Video)
            .unwrap()
            .track
            .as_ref()
            .unwrap()
            .width,
        Some(1280)
    );

    // Remove: no live webcam producer, preference persisted as disabled.
    handle.remove_webcam().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert!(state.producer(MediaKind::Video).is_none());
    assert!(!room.preferences.load().unwrap().webcam_enabled);
    assert!(room
        .media
        .last_producer(MediaKind::Video)
        .unwrap()
        .is_closed());
    assert!(room.sink.error_notices().is_empty());
}

#[tokio::test]
async fn test_resolution_rollback_on_capture_failure() {
    let (room, handle) = joined_without_webcam(two_webcams()).await;
    handle.add_webcam().await.unwrap();
    let before = handle.get_state().await.unwrap();
    let track_before = before.producer(MediaKind::Video).unwrap().track.clone();

    room.devices.fail_next_video_capture();
    let result = handle.cycle_webcam_resolution().await;

    assert!(matches!(
        result,
        Err(RoomError::Device(DeviceError::Capture(_)))
    ));
    let after = handle.get_state().await.unwrap();
    assert_eq!(after.webcam.resolution, ResolutionTier::Vga);
    assert_eq!(
        after.producer(MediaKind::Video).unwrap().track,
        track_before
    );
    assert_eq!(
        room.media
            .last_producer(MediaKind::Video)
            .unwrap()
            .replace_count(),
        0
    );

    let errors = room.sink.error_notices();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Could not change webcam resolution"));
    assert!(!after.webcam_in_progress);

    // The attempted capture targeted the next tier.
    let captures = room.devices.captures();
    assert_eq!(
        captures.last().unwrap(),
        &CaptureRequest::Video {
            device_id: "cam-0".to_string(),
            resolution: ResolutionTier::Hd,
        }
    );
}

#[tokio::test]
async fn test_resolution_cycles_back_after_three_steps() {
    let (_room, handle) = joined_without_webcam(two_webcams()).await;
    handle.add_webcam().await.unwrap();

    for expected in [ResolutionTier::Hd, ResolutionTier::Qvga, ResolutionTier::Vga] {
        handle.cycle_webcam_resolution().await.unwrap();
        assert_eq!(handle.get_state().await.unwrap().webcam.resolution, expected);
    }
}

#[tokio::test]
async fn test_device_cycle_wraps_around() {
    let (_room, handle) = joined_without_webcam(two_webcams()).await;
    handle.add_webcam().await.unwrap();

    handle.cycle_webcam_device().await.unwrap();
    handle.cycle_webcam_device().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert_eq!(state.webcam.device.as_ref().unwrap().device_id, "cam-0");
}

#[tokio::test]
async fn test_device_cycle_without_devices_fails() {
    let (room, handle) = joined_without_webcam(two_webcams()).await;
    handle.add_webcam().await.unwrap();

    room.devices.set_webcams(Vec::new());
    let err = handle.cycle_webcam_device().await.unwrap_err();

    assert!(matches!(err, RoomError::NoWebcamDevices));
    assert_eq!(err.error_code(), 404);
    let state = handle.get_state().await.unwrap();
    assert!(state.webcam.device.is_none());
    assert!(!state.can_change_webcam);
    assert!(!state.webcam_in_progress);
    assert_eq!(
        room.sink.error_notices(),
        vec!["Could not change webcam: No camera found".to_string()]
    );
}

#[tokio::test]
async fn test_device_cycle_requires_webcam_producer() {
    let (_room, handle) = joined_without_webcam(two_webcams()).await;

    let err = handle.cycle_webcam_device().await.unwrap_err();
    assert!(matches!(err, RoomError::NoProducer(MediaKind::Video)));
}

#[tokio::test]
async fn test_webcam_in_progress_is_published_around_operations() {
    let (room, handle) = joined_without_webcam(two_webcams()).await;
    room.sink.clear();

    handle.add_webcam().await.unwrap();

    let flags: Vec<bool> = room
        .sink
        .updates()
        .into_iter()
        .filter_map(|u| match u {
            StateUpdate::WebcamInProgress { in_progress } => Some(in_progress),
            _ => None,
        })
        .collect();
    assert_eq!(flags, vec![true, false]);
}

#[tokio::test]
async fn test_at_most_one_producer_per_kind() {
    let (room, handle) = joined_without_webcam(two_webcams()).await;
    handle.add_webcam().await.unwrap();

    let err = handle.add_webcam().await.unwrap_err();
    assert!(matches!(err, RoomError::ProducerExists(MediaKind::Video)));
    assert_eq!(err.error_code(), 409);

    let state = handle.get_state().await.unwrap();
    assert_eq!(
        state
            .producers
            .iter()
            .filter(|p| p.kind == MediaKind::Video)
            .count(),
        1
    );
    assert_eq!(
        room.media
            .producers()
            .iter()
            .filter(|p| p.kind() == MediaKind::Video)
            .count(),
        1
    );
}

#[tokio::test]
async fn test_add_webcam_without_permission_is_denied() {
    let room = TestRoom::builder()
        .media(MockMediaSession::builder().can_send_audio(true).build())
        .devices(two_webcams())
        .preferences(Preferences {
            display_name: None,
            webcam_enabled: false,
        })
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    let err = handle.add_webcam().await.unwrap_err();
    assert!(matches!(err, RoomError::CapabilityDenied(MediaKind::Video)));
    assert_eq!(err.error_code(), 403);
    assert!(room.media.last_producer(MediaKind::Video).is_none());
}

#[tokio::test]
async fn test_producer_creation_failure_leaves_no_producer() {
    let room = TestRoom::builder()
        .media(
            MockMediaSession::builder()
                .can_send_audio(true)
                .can_send_video(true)
                .fail_create_producer(MediaKind::Video)
                .build(),
        )
        .devices(two_webcams())
        .preferences(Preferences {
            display_name: None,
            webcam_enabled: false,
        })
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    assert!(handle.add_webcam().await.is_err());
    let state = handle.get_state().await.unwrap();
    assert!(state.producer(MediaKind::Video).is_none());
    // The capture was released after the failed creation.
    assert_eq!(room.devices.released().len(), room.devices.captures().len());
}

#[tokio::test]
async fn test_mute_and_unmute_mic() {
    let room = TestRoom::builder().devices(two_webcams()).build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    handle.mute_mic().await.unwrap();
    let state = handle.get_state().await.unwrap();
    let mic = state.producer(MediaKind::Audio).unwrap();
    assert!(mic.locally_paused);
    assert!(!mic.is_live());

    handle.unmute_mic().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert!(state.producer(MediaKind::Audio).unwrap().is_live());
}

#[tokio::test]
async fn test_mute_without_mic_fails() {
    let room = TestRoom::builder()
        .media(MockMediaSession::builder().can_send_video(true).build())
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    let err = handle.mute_mic().await.unwrap_err();
    assert!(matches!(err, RoomError::NoProducer(MediaKind::Audio)));
}

#[tokio::test]
async fn test_remotely_closed_producer_is_removed() {
    let room = TestRoom::builder().devices(two_webcams()).build();
    let handle = room.spawn_joined(test_config("room-1")).await;

    room.media
        .last_producer(MediaKind::Video)
        .unwrap()
        .remote_close();
    room.sink
        .wait_for(|u| matches!(u, StateUpdate::ProducerClosed { .. }))
        .await;

    let state = handle.get_state().await.unwrap();
    assert!(state.producer(MediaKind::Video).is_none());
    // A new webcam can be added afterwards.
    handle.add_webcam().await.unwrap();
}

// ============================================================================
// Audio-only mode
// ============================================================================

#[tokio::test]
async fn test_audio_only_round_trip() {
    let bob = MockPeer::new("bob", "Bob")
        .with_consumer(MockConsumer::new("c-audio", "bob", MediaKind::Audio))
        .with_consumer(MockConsumer::new("c-video", "bob", MediaKind::Video));
    let room = TestRoom::builder()
        .media(
            MockMediaSession::builder()
                .can_send_audio(true)
                .can_send_video(true)
                .with_peer(bob)
                .build(),
        )
        .devices(two_webcams())
        .build();
    let handle = room.spawn_joined(test_config("room-1")).await;
    assert!(handle
        .get_state()
        .await
        .unwrap()
        .producer(MediaKind::Video)
        .is_some());

    handle.enable_audio_only().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert!(state.audio_only);
    assert!(state.producer(MediaKind::Video).is_none());
    assert!(state.consumer("c-video").unwrap().locally_paused);
    assert!(!state.consumer("c-audio").unwrap().locally_paused);
    // The stored preference is untouched.
    assert!(room.preferences.load().unwrap().webcam_enabled);

    handle.disable_audio_only().await.unwrap();
    let state = handle.get_state().await.unwrap();
    assert!(!state.audio_only);
    assert!(!state.audio_only_in_progress);
    assert!(state.producer(MediaKind::Video).is_some());
    assert!(!state.consumer("c-video").unwrap().locally_paused);
}

#[tokio::test]
async fn test_video_consumer_arriving_in_audio_only_is_paused() {
    let room = TestRoom::builder().devices(two_webcams()).build();
    let carol = std::sync::Arc::new(MockPeer::new("carol", "Carol"));
    room.media.set_peers(vec![std::sync::Arc::clone(&carol)]);
    let handle = room.spawn_joined(test_config("room-1")).await;

    handle.enable_audio_only().await.unwrap();
    let consumer = std::sync::Arc::new(MockConsumer::new("c-late", "carol", MediaKind::Video));
    carol.add_consumer(std::sync::Arc::clone(&consumer));
    room.sink
        .wait_for(|u| matches!(u, StateUpdate::ConsumerPaused { .. }))
        .await;

    assert!(consumer.locally_paused());
    let state = handle.get_state().await.unwrap();
    assert!(state.consumer("c-late").unwrap().locally_paused);
}
