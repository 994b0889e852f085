//! Room client error types.
//!
//! Errors map to signaling-style numeric codes so they can be used directly
//! when rejecting inbound requests. Internal details are logged but never
//! shown to the user.

use crate::media::MediaKind;
use thiserror::Error;

/// Room client error type.
///
/// Maps to numeric codes:
/// - `NoProducer`, `NoWebcamDevices`, `Device(NotFound)`: `404`
/// - `ProducerExists`: `409`
/// - `CapabilityDenied`, `Device(PermissionDenied)`: `403`
/// - `Closed`, `NotConnected`, `Signaling`: `503`
/// - everything else: `500`
#[derive(Debug, Error)]
pub enum RoomError {
    /// The room session has been closed.
    #[error("Room is closed")]
    Closed,

    /// The operation needs a joined room.
    #[error("Not connected to the room")]
    NotConnected,

    /// Signaling request failed.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Media session operation failed.
    #[error("Media error: {0}")]
    Media(String),

    /// Capture device error.
    #[error("Device error: {0}")]
    Device(DeviceError),

    /// Sending this kind of media is not permitted in the room.
    #[error("Cannot send {0}")]
    CapabilityDenied(MediaKind),

    /// A producer of this kind already exists.
    #[error("{0} producer already exists")]
    ProducerExists(MediaKind),

    /// No producer of this kind exists.
    #[error("No {0} producer")]
    NoProducer(MediaKind),

    /// No video input device is available.
    #[error("No webcam devices")]
    NoWebcamDevices,

    /// Unknown resolution tier.
    #[error("Invalid resolution: {0}")]
    InvalidResolution(String),

    /// The join sequence failed.
    #[error("Join failed: {0}")]
    JoinFailed(String),

    /// Preference store error.
    #[error("Preferences error: {0}")]
    Preferences(String),

    /// Internal error (actor channel failures and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Capture device errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Requested device does not exist.
    #[error("Device not found")]
    NotFound,

    /// The user or platform denied access to the device.
    #[error("Permission denied")]
    PermissionDenied,

    /// Capture could not be started.
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Device enumeration failed.
    #[error("Enumeration failed: {0}")]
    Enumeration(String),
}

/// Errors reported by the media session and its transports, producers and
/// consumers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// The media session is not joined.
    #[error("Not joined")]
    NotJoined,

    /// The object was already closed.
    #[error("Closed")]
    Closed,

    /// The media kind cannot be handled.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The remote side rejected the operation.
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors reported by the signaling session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalingError {
    /// The peer answered the request with an error response.
    #[error("Request rejected ({code}): {reason}")]
    Rejected { code: u16, reason: String },

    /// The signaling channel is not open.
    #[error("Signaling channel closed")]
    Closed,

    /// No response arrived in time.
    #[error("Request timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl RoomError {
    /// Returns the numeric code for this error.
    #[must_use]
    pub fn error_code(&self) -> u16 {
        match self {
            RoomError::NoProducer(_)
            | RoomError::NoWebcamDevices
            | RoomError::Device(DeviceError::NotFound) => 404,
            RoomError::ProducerExists(_) => 409,
            RoomError::CapabilityDenied(_) | RoomError::Device(DeviceError::PermissionDenied) => {
                403
            }
            RoomError::Closed | RoomError::NotConnected | RoomError::Signaling(_) => 503,
            RoomError::Media(_)
            | RoomError::Device(_)
            | RoomError::InvalidResolution(_)
            | RoomError::JoinFailed(_)
            | RoomError::Preferences(_)
            | RoomError::Internal(_) => 500,
        }
    }

    /// Returns a user-facing message (no internal details).
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            RoomError::Internal(_) | RoomError::Preferences(_) => {
                "An internal error occurred".to_string()
            }
            RoomError::Device(DeviceError::PermissionDenied) => {
                "Permission to use the device was denied".to_string()
            }
            RoomError::Device(DeviceError::NotFound) | RoomError::NoWebcamDevices => {
                "No camera found".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<DeviceError> for RoomError {
    fn from(err: DeviceError) -> Self {
        RoomError::Device(err)
    }
}

impl From<MediaError> for RoomError {
    fn from(err: MediaError) -> Self {
        RoomError::Media(err.to_string())
    }
}

impl From<SignalingError> for RoomError {
    fn from(err: SignalingError) -> Self {
        RoomError::Signaling(err.to_string())
    }
}
