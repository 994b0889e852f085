//! State updates published to the application's state store.
//!
//! The store is an observer: it receives discrete, owned copies of the
//! controller's state and never live references.

use crate::devices::{CameraFacing, ResolutionTier};
use crate::media::{DeviceInfo, MediaKind, MediaTrack, Originator};
use chrono::{DateTime, Utc};
use common::types::{ConsumerId, NoticeId, PeerName, ProducerId};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::broadcast;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomState {
    New,
    Connecting,
    Connected,
    Closed,
}

impl RoomState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RoomState::New => "new",
            RoomState::Connecting => "connecting",
            RoomState::Connected => "connected",
            RoomState::Closed => "closed",
        }
    }
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What this client may send in the joined room.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaCapabilities {
    pub can_send_mic: bool,
    pub can_send_webcam: bool,
}

/// Derived copy of a local producer.
///
/// Both pause flags are kept: a producer can be paused locally, remotely,
/// or both, and renderers may need the distinction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerInfo {
    pub id: ProducerId,
    pub kind: MediaKind,
    pub source: String,
    pub track: Option<MediaTrack>,
    pub codec: Option<String>,
    pub locally_paused: bool,
    pub remotely_paused: bool,
    pub device_label: Option<String>,
    pub facing: Option<CameraFacing>,
    pub resolution: Option<ResolutionTier>,
}

impl ProducerInfo {
    /// Whether media is actually flowing (paused on neither side).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.locally_paused && !self.remotely_paused
    }
}

/// Derived copy of a remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerInfo {
    pub name: PeerName,
    pub display_name: String,
    pub device: DeviceInfo,
    pub consumers: Vec<ConsumerId>,
}

/// Derived copy of a remote consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerInfo {
    pub id: ConsumerId,
    pub peer_name: PeerName,
    pub kind: MediaKind,
    pub source: String,
    pub supported: bool,
    pub locally_paused: bool,
    pub remotely_paused: bool,
    pub codec: Option<String>,
    pub track: Option<MediaTrack>,
}

impl ConsumerInfo {
    /// Whether media is actually flowing (paused on neither side).
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.locally_paused && !self.remotely_paused
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

impl NoticeLevel {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        }
    }
}

/// User-facing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub id: NoticeId,
    pub level: NoticeLevel,
    pub text: String,
    pub timeout_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    #[must_use]
    pub fn new(level: NoticeLevel, text: impl Into<String>, timeout: Duration) -> Self {
        Self {
            id: NoticeId::new(),
            level,
            text: text.into(),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            created_at: Utc::now(),
        }
    }
}

/// Discrete state update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StateUpdate {
    RoomState {
        state: RoomState,
    },
    MediaCapabilities(MediaCapabilities),
    CanChangeWebcam {
        can_change: bool,
    },
    WebcamInProgress {
        in_progress: bool,
    },
    AudioOnly {
        enabled: bool,
    },
    AudioOnlyInProgress {
        in_progress: bool,
    },
    DisplayName {
        display_name: String,
    },
    NewProducer(ProducerInfo),
    ProducerClosed {
        producer_id: ProducerId,
    },
    ProducerPaused {
        producer_id: ProducerId,
        originator: Originator,
    },
    ProducerResumed {
        producer_id: ProducerId,
        originator: Originator,
    },
    ProducerTrack {
        producer_id: ProducerId,
        track: Option<MediaTrack>,
        device_label: Option<String>,
        facing: Option<CameraFacing>,
        resolution: Option<ResolutionTier>,
    },
    NewPeer(PeerInfo),
    PeerClosed {
        peer_name: PeerName,
    },
    NewConsumer(ConsumerInfo),
    ConsumerClosed {
        consumer_id: ConsumerId,
        peer_name: PeerName,
    },
    ConsumerPaused {
        consumer_id: ConsumerId,
        originator: Originator,
    },
    ConsumerResumed {
        consumer_id: ConsumerId,
        originator: Originator,
    },
    ConsumerTrack {
        consumer_id: ConsumerId,
        track: MediaTrack,
    },
    ShowNotification(Notice),
    RemoveNotification {
        id: NoticeId,
    },
    RemoveAllNotifications,
}

/// Receiver of state updates. Fire-and-forget.
pub trait StateSink: Send + Sync {
    fn publish(&self, update: StateUpdate);
}

/// [`StateSink`] fanning updates out over a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: broadcast::Sender<StateUpdate>,
}

impl ChannelSink {
    /// Create a sink with room for `capacity` unread updates per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<StateUpdate>) {
        let (sender, receiver) = broadcast::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StateUpdate> {
        self.sender.subscribe()
    }
}

impl StateSink for ChannelSink {
    fn publish(&self, update: StateUpdate) {
        // No receivers is fine; updates are fire-and-forget.
        let _ = self.sender.send(update);
    }
}
