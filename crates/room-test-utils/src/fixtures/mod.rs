//! Pre-configured test data fixtures for room controller testing.
//!
//! Provides:
//! - A [`Config`] suitable for tests
//! - [`TestRoom`], bundling one mock per collaborator

use crate::mock_devices::MockDevices;
use crate::mock_media::MockMediaSession;
use crate::mock_signaling::MockSignaling;
use crate::recording_sink::RecordingSink;
use room_client::actors::RoomControllerHandle;
use room_client::config::Config;
use room_client::events::RoomState;
use room_client::preferences::{MemoryPreferenceStore, Preferences};
use room_client::RoomCollaborators;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Test config for `room_id` with a fixed peer name and display name.
#[must_use]
pub fn test_config(room_id: &str) -> Config {
    let mut config = Config::for_room(room_id);
    config.peer_name = "local-peer".to_string();
    config.display_name = Some("Tester".to_string());
    config
}

/// Test config for a random room.
#[must_use]
pub fn random_config() -> Config {
    test_config(&format!("room-{}", Uuid::new_v4()))
}

/// One mock per collaborator of the room controller.
pub struct TestRoom {
    pub signaling: Arc<MockSignaling>,
    pub media: Arc<MockMediaSession>,
    pub devices: Arc<MockDevices>,
    pub sink: Arc<RecordingSink>,
    pub preferences: Arc<MemoryPreferenceStore>,
}

impl TestRoom {
    /// Create a new TestRoom builder.
    #[must_use]
    pub fn builder() -> TestRoomBuilder {
        TestRoomBuilder::default()
    }

    /// Collaborators handed to the controller.
    #[must_use]
    pub fn collaborators(&self) -> RoomCollaborators {
        RoomCollaborators {
            signaling: Arc::clone(&self.signaling) as _,
            media: Arc::clone(&self.media) as _,
            devices: Arc::clone(&self.devices) as _,
            sink: Arc::clone(&self.sink) as _,
            preferences: Arc::clone(&self.preferences) as _,
        }
    }

    /// Spawn a controller over the mocks.
    pub fn spawn(&self, config: Config) -> (RoomControllerHandle, JoinHandle<()>) {
        RoomControllerHandle::spawn(config, self.collaborators())
    }

    /// Spawn a controller and wait until it has joined.
    ///
    /// # Panics
    ///
    /// Panics if the room does not reach `connected`.
    pub async fn spawn_joined(&self, config: Config) -> RoomControllerHandle {
        let (handle, _task) = self.spawn(config);
        self.sink.wait_for_state(RoomState::Connected, 1).await;
        handle
    }
}

/// Builder for TestRoom.
#[derive(Default)]
pub struct TestRoomBuilder {
    signaling: Option<MockSignaling>,
    media: Option<MockMediaSession>,
    devices: Option<MockDevices>,
    preferences: Option<Preferences>,
}

impl TestRoomBuilder {
    #[must_use]
    pub fn signaling(mut self, signaling: MockSignaling) -> Self {
        self.signaling = Some(signaling);
        self
    }

    #[must_use]
    pub fn media(mut self, media: MockMediaSession) -> Self {
        self.media = Some(media);
        self
    }

    #[must_use]
    pub fn devices(mut self, devices: MockDevices) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Stored preferences the controller starts with.
    #[must_use]
    pub fn preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Build the TestRoom. Unset mocks use their defaults; the media session
    /// defaults to one that may send audio and video.
    #[must_use]
    pub fn build(self) -> TestRoom {
        TestRoom {
            signaling: Arc::new(self.signaling.unwrap_or_default()),
            media: Arc::new(self.media.unwrap_or_else(MockMediaSession::permissive)),
            devices: Arc::new(self.devices.unwrap_or_default()),
            sink: Arc::new(RecordingSink::new()),
            preferences: Arc::new(
                self.preferences
                    .map(MemoryPreferenceStore::with_preferences)
                    .unwrap_or_default(),
            ),
        }
    }
}
