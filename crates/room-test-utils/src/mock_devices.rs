//! Mock capture devices.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockDevices;
//!
//! let devices = MockDevices::builder()
//!     .with_webcam("cam-0", "Front Camera")
//!     .with_webcam("cam-1", "Back Camera")
//!     .build();
//!
//! // Make the next webcam capture fail
//! devices.fail_next_video_capture();
//! ```

use async_trait::async_trait;
use room_client::devices::{CaptureRequest, MediaDevices, VideoDevice};
use room_client::errors::DeviceError;
use room_client::media::{MediaKind, MediaTrack};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct DevicesState {
    webcams: Vec<VideoDevice>,
    fail_video_captures: usize,
    deny_audio: bool,
    captures: Vec<CaptureRequest>,
    released: Vec<String>,
    enumerations: usize,
}

/// Mock capture devices.
#[derive(Debug, Default)]
pub struct MockDevices {
    state: Mutex<DevicesState>,
    next_track: AtomicUsize,
}

impl MockDevices {
    /// Create a new MockDevices builder.
    #[must_use]
    pub fn builder() -> MockDevicesBuilder {
        MockDevicesBuilder::default()
    }

    /// Replace the list of webcams reported by the next enumeration.
    pub fn set_webcams(&self, webcams: Vec<VideoDevice>) {
        self.state.lock().unwrap().webcams = webcams;
    }

    /// Make the next video capture fail.
    pub fn fail_next_video_capture(&self) {
        self.state.lock().unwrap().fail_video_captures += 1;
    }

    /// Every capture request, in order, including failed ones.
    #[must_use]
    pub fn captures(&self) -> Vec<CaptureRequest> {
        self.state.lock().unwrap().captures.clone()
    }

    /// Ids of released capture tracks, in order.
    #[must_use]
    pub fn released(&self) -> Vec<String> {
        self.state.lock().unwrap().released.clone()
    }

    #[must_use]
    pub fn enumeration_count(&self) -> usize {
        self.state.lock().unwrap().enumerations
    }
}

#[async_trait]
impl MediaDevices for MockDevices {
    async fn enumerate_video_inputs(&self) -> Result<Vec<VideoDevice>, DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.enumerations += 1;
        Ok(state.webcams.clone())
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<MediaTrack, DeviceError> {
        let mut state = self.state.lock().unwrap();
        state.captures.push(request.clone());
        let n = self.next_track.fetch_add(1, Ordering::SeqCst);

        match request {
            CaptureRequest::Audio => {
                if state.deny_audio {
                    return Err(DeviceError::PermissionDenied);
                }
                Ok(MediaTrack {
                    id: format!("mic-track-{n}"),
                    kind: MediaKind::Audio,
                    device_id: None,
                    width: None,
                    height: None,
                })
            }
            CaptureRequest::Video {
                device_id,
                resolution,
            } => {
                if state.fail_video_captures > 0 {
                    state.fail_video_captures -= 1;
                    return Err(DeviceError::Capture("camera busy".to_string()));
                }
                if !state.webcams.iter().any(|w| &w.device_id == device_id) {
                    return Err(DeviceError::NotFound);
                }
                let (width, height) = resolution.dimensions();
                Ok(MediaTrack {
                    id: format!("webcam-track-{n}"),
                    kind: MediaKind::Video,
                    device_id: Some(device_id.clone()),
                    width: Some(width),
                    height: Some(height),
                })
            }
        }
    }

    fn release(&self, track: &MediaTrack) {
        self.state.lock().unwrap().released.push(track.id.clone());
    }
}

/// Builder for MockDevices configuration.
#[derive(Debug, Default)]
pub struct MockDevicesBuilder {
    webcams: Vec<VideoDevice>,
    deny_audio: bool,
}

impl MockDevicesBuilder {
    /// Add a webcam to the enumeration.
    #[must_use]
    pub fn with_webcam(mut self, device_id: &str, label: &str) -> Self {
        self.webcams.push(VideoDevice::new(device_id, label));
        self
    }

    /// Deny microphone capture.
    #[must_use]
    pub fn deny_audio(mut self) -> Self {
        self.deny_audio = true;
        self
    }

    /// Build the MockDevices.
    #[must_use]
    pub fn build(self) -> MockDevices {
        MockDevices {
            state: Mutex::new(DevicesState {
                webcams: self.webcams,
                deny_audio: self.deny_audio,
                ..DevicesState::default()
            }),
            next_track: AtomicUsize::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use room_client::devices::ResolutionTier;

    #[tokio::test]
    async fn test_video_capture_uses_tier_dimensions() {
        let devices = MockDevices::builder().with_webcam("cam-0", "Front").build();
        let track = devices
            .capture(&CaptureRequest::Video {
                device_id: "cam-0".to_string(),
                resolution: ResolutionTier::Hd,
            })
            .await
            .unwrap();

        assert_eq!(track.width, Some(1280));
        assert_eq!(track.height, Some(720));
        assert_eq!(track.device_id.as_deref(), Some("cam-0"));
    }

    #[tokio::test]
    async fn test_fail_next_video_capture_fails_once() {
        let devices = MockDevices::builder().with_webcam("cam-0", "Front").build();
        devices.fail_next_video_capture();
        let request = CaptureRequest::Video {
            device_id: "cam-0".to_string(),
            resolution: ResolutionTier::Vga,
        };

        assert!(devices.capture(&request).await.is_err());
        assert!(devices.capture(&request).await.is_ok());
        assert_eq!(devices.captures().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_device_is_not_found() {
        let devices = MockDevices::default();
        let result = devices
            .capture(&CaptureRequest::Video {
                device_id: "missing".to_string(),
                resolution: ResolutionTier::Vga,
            })
            .await;
        assert!(matches!(result, Err(DeviceError::NotFound)));
    }
}
