//! Capture devices, the webcam catalog and the webcam selection.

use crate::errors::{DeviceError, RoomError};
use crate::media::MediaTrack;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A video input device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDevice {
    pub device_id: String,
    pub label: String,
}

impl VideoDevice {
    #[must_use]
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
        }
    }

    #[must_use]
    pub fn facing(&self) -> CameraFacing {
        CameraFacing::from_label(&self.label)
    }
}

/// Webcam resolution tier, ordered `qvga < vga < hd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionTier {
    Qvga,
    #[default]
    Vga,
    Hd,
}

impl ResolutionTier {
    /// Next tier in the cycle `qvga -> vga -> hd -> qvga`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            ResolutionTier::Qvga => ResolutionTier::Vga,
            ResolutionTier::Vga => ResolutionTier::Hd,
            ResolutionTier::Hd => ResolutionTier::Qvga,
        }
    }

    /// Ideal `(width, height)` capture constraints.
    #[must_use]
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            ResolutionTier::Qvga => (320, 240),
            ResolutionTier::Vga => (640, 480),
            ResolutionTier::Hd => (1280, 720),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResolutionTier::Qvga => "qvga",
            ResolutionTier::Vga => "vga",
            ResolutionTier::Hd => "hd",
        }
    }
}

impl fmt::Display for ResolutionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolutionTier {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "qvga" => Ok(ResolutionTier::Qvga),
            "vga" => Ok(ResolutionTier::Vga),
            "hd" => Ok(ResolutionTier::Hd),
            other => Err(RoomError::InvalidResolution(other.to_string())),
        }
    }
}

/// Which way a camera faces, guessed from its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

impl CameraFacing {
    /// Best-effort label heuristic: "back" or "rear" anywhere in the label
    /// means a back camera.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("back") || label.contains("rear") {
            CameraFacing::Back
        } else {
            CameraFacing::Front
        }
    }
}

/// Capture constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureRequest {
    Audio,
    Video {
        device_id: String,
        resolution: ResolutionTier,
    },
}

/// Platform capture capability.
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// List the available video input devices.
    async fn enumerate_video_inputs(&self) -> Result<Vec<VideoDevice>, DeviceError>;

    /// Start a capture matching `request`.
    async fn capture(&self, request: &CaptureRequest) -> Result<MediaTrack, DeviceError>;

    /// Stop a capture track.
    fn release(&self, track: &MediaTrack);
}

/// Video input devices from the latest enumeration, in enumeration order.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Vec<VideoDevice>,
}

impl DeviceCatalog {
    /// Replace the catalog contents. Duplicate ids keep their first entry.
    pub fn rebuild(&mut self, devices: Vec<VideoDevice>) {
        self.devices.clear();
        for device in devices {
            if !self.contains(&device.device_id) {
                self.devices.push(device);
            }
        }
    }

    #[must_use]
    pub fn contains(&self, device_id: &str) -> bool {
        self.position(device_id).is_some()
    }

    #[must_use]
    pub fn position(&self, device_id: &str) -> Option<usize> {
        self.devices.iter().position(|d| d.device_id == device_id)
    }

    #[must_use]
    pub fn first(&self) -> Option<&VideoDevice> {
        self.devices.first()
    }

    /// Device after `current`, wrapping to the first. An unknown or absent
    /// `current` counts as position -1, selecting the first device.
    #[must_use]
    pub fn next_after(&self, current: Option<&str>) -> Option<&VideoDevice> {
        let next = match current.and_then(|id| self.position(id)) {
            Some(idx) if idx + 1 < self.devices.len() => idx + 1,
            _ => 0,
        };
        self.devices.get(next)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Whether a "change camera" action makes sense.
    #[must_use]
    pub fn can_change(&self) -> bool {
        self.devices.len() >= 2
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoDevice> {
        self.devices.iter()
    }
}

/// Current webcam intent: which device and which resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebcamSelection {
    pub device: Option<VideoDevice>,
    pub resolution: ResolutionTier,
}

impl WebcamSelection {
    /// Bring the selection in line with a freshly rebuilt catalog.
    ///
    /// Empty catalog clears the device; a device no longer present falls
    /// back to the first entry. The selected device always ends up `None`
    /// or a member of `catalog`.
    pub fn reconcile(&mut self, catalog: &DeviceCatalog) {
        let keep = self
            .device
            .as_ref()
            .and_then(|d| catalog.iter().find(|c| c.device_id == d.device_id))
            .cloned();

        self.device = keep.or_else(|| catalog.first().cloned());
    }

    /// Switch to the next device in `catalog`, resetting the resolution.
    /// Returns `false` when the catalog is empty.
    pub fn select_next(&mut self, catalog: &DeviceCatalog) -> bool {
        let current = self.device.as_ref().map(|d| d.device_id.as_str());
        match catalog.next_after(current).cloned() {
            Some(next) => {
                self.device = Some(next);
                self.resolution = ResolutionTier::default();
                true
            }
            None => {
                self.device = None;
                false
            }
        }
    }

    /// Capture request for the current intent, if a device is selected.
    #[must_use]
    pub fn capture_request(&self) -> Option<CaptureRequest> {
        self.device.as_ref().map(|d| CaptureRequest::Video {
            device_id: d.device_id.clone(),
            resolution: self.resolution,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn devices(ids: &[&str]) -> Vec<VideoDevice> {
        ids.iter()
            .map(|id| VideoDevice::new(*id, format!("Camera {id}")))
            .collect()
    }

    fn catalog(ids: &[&str]) -> DeviceCatalog {
        let mut catalog = DeviceCatalog::default();
        catalog.rebuild(devices(ids));
        catalog
    }

    #[test]
    fn test_resolution_cycle_returns_after_three_steps() {
        for tier in [ResolutionTier::Qvga, ResolutionTier::Vga, ResolutionTier::Hd] {
            assert_eq!(tier.next().next().next(), tier);
            assert_ne!(tier.next(), tier);
        }
        assert_eq!(ResolutionTier::Vga.next(), ResolutionTier::Hd);
        assert_eq!(ResolutionTier::Hd.next(), ResolutionTier::Qvga);
    }

    #[test]
    fn test_resolution_parse_rejects_unknown_tier() {
        assert_eq!("hd".parse::<ResolutionTier>().unwrap(), ResolutionTier::Hd);
        let err = "4k".parse::<ResolutionTier>().unwrap_err();
        assert!(matches!(err, RoomError::InvalidResolution(ref t) if t == "4k"));
    }

    #[test]
    fn test_resolution_defaults_and_dimensions() {
        assert_eq!(ResolutionTier::default(), ResolutionTier::Vga);
        assert_eq!(ResolutionTier::Qvga.dimensions(), (320, 240));
        assert_eq!(ResolutionTier::Vga.dimensions(), (640, 480));
        assert_eq!(ResolutionTier::Hd.dimensions(), (1280, 720));
        assert!(ResolutionTier::Qvga < ResolutionTier::Vga);
        assert!(ResolutionTier::Vga < ResolutionTier::Hd);
    }

    #[test]
    fn test_camera_facing_from_label() {
        assert_eq!(CameraFacing::from_label("Back Camera"), CameraFacing::Back);
        assert_eq!(
            CameraFacing::from_label("camera2 0, facing REAR"),
            CameraFacing::Back
        );
        assert_eq!(
            CameraFacing::from_label("FaceTime HD Camera"),
            CameraFacing::Front
        );
        assert_eq!(CameraFacing::from_label(""), CameraFacing::Front);
    }

    #[test]
    fn test_catalog_dedups_by_id() {
        let mut catalog = DeviceCatalog::default();
        catalog.rebuild(vec![
            VideoDevice::new("a", "first"),
            VideoDevice::new("b", "second"),
            VideoDevice::new("a", "duplicate"),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.first().unwrap().label, "first");
        assert!(catalog.can_change());
    }

    #[test]
    fn test_next_after_wraps_and_handles_unknown() {
        let catalog = catalog(&["a", "b", "c"]);
        assert_eq!(catalog.next_after(Some("a")).unwrap().device_id, "b");
        assert_eq!(catalog.next_after(Some("c")).unwrap().device_id, "a");
        assert_eq!(catalog.next_after(Some("zzz")).unwrap().device_id, "a");
        assert_eq!(catalog.next_after(None).unwrap().device_id, "a");
        assert!(DeviceCatalog::default().next_after(None).is_none());
    }

    #[test]
    fn test_reconcile_keeps_present_device() {
        let mut selection = WebcamSelection {
            device: Some(VideoDevice::new("b", "Camera b")),
            resolution: ResolutionTier::Hd,
        };
        selection.reconcile(&catalog(&["a", "b"]));
        assert_eq!(selection.device.unwrap().device_id, "b");
        assert_eq!(selection.resolution, ResolutionTier::Hd);
    }

    #[test]
    fn test_reconcile_falls_back_to_first_or_none() {
        let mut selection = WebcamSelection {
            device: Some(VideoDevice::new("gone", "Unplugged")),
            resolution: ResolutionTier::Vga,
        };
        selection.reconcile(&catalog(&["x", "y"]));
        assert_eq!(selection.device.as_ref().unwrap().device_id, "x");

        selection.reconcile(&DeviceCatalog::default());
        assert!(selection.device.is_none());
    }

    #[test]
    fn test_selection_is_always_member_of_latest_catalog() {
        let refreshes: [&[&str]; 7] = [
            &["a", "b"],
            &[],
            &["c"],
            &["c", "d", "e"],
            &["e"],
            &["a", "e", "a"],
            &["f"],
        ];

        let mut selection = WebcamSelection::default();
        for (step, ids) in refreshes.iter().enumerate() {
            let catalog = catalog(ids);
            selection.reconcile(&catalog);
            if step % 2 == 1 {
                selection.select_next(&catalog);
            }

            match &selection.device {
                None => assert!(catalog.is_empty()),
                Some(device) => assert!(catalog.contains(&device.device_id)),
            }
        }
    }

    #[test]
    fn test_select_next_resets_resolution() {
        let catalog = catalog(&["a", "b"]);
        let mut selection = WebcamSelection {
            device: Some(VideoDevice::new("a", "Camera a")),
            resolution: ResolutionTier::Hd,
        };

        assert!(selection.select_next(&catalog));
        assert_eq!(selection.device.as_ref().unwrap().device_id, "b");
        assert_eq!(selection.resolution, ResolutionTier::Vga);

        let request = selection.capture_request().unwrap();
        assert_eq!(
            request,
            CaptureRequest::Video {
                device_id: "b".to_string(),
                resolution: ResolutionTier::Vga
            }
        );
    }
}
