//! # Room Test Utilities
//!
//! In-memory mocks of every collaborator of the room controller, plus
//! fixtures for isolated controller testing.
//!
//! ## Modules
//!
//! - `mock_signaling` - Signaling session with scripted lifecycle events
//! - `mock_media` - Media session, transports, producers, consumers, peers
//! - `mock_devices` - Capture devices with configurable webcams and failures
//! - `recording_sink` - State sink recording every published update
//! - `fixtures` - Test config and a bundled [`TestRoom`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let room = TestRoom::builder()
//!         .media(MockMediaSession::builder().can_send_audio(true).build())
//!         .devices(MockDevices::builder().with_webcam("cam-0", "Front Camera").build())
//!         .build();
//!
//!     let handle = room.spawn_joined(test_config("room-1")).await;
//!     handle.add_webcam().await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod mock_devices;
pub mod mock_media;
pub mod mock_signaling;
pub mod recording_sink;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_devices::*;
pub use mock_media::*;
pub use mock_signaling::*;
pub use recording_sink::*;
