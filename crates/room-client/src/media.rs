//! Media session contract.
//!
//! The media session is the local representation of the joined room: its
//! transports, the local producers and the remote peers with their
//! consumers. Everything here is an interface boundary; codec negotiation
//! and wire formats live in the implementation.

use crate::errors::MediaError;
use crate::signaling::Responder;
use crate::subscription::{Listener, Subscription};
use async_trait::async_trait;
use common::types::{ConsumerId, PeerName, ProducerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Media kind of a track, producer or consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who initiated a close/pause/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Originator {
    Local,
    Remote,
}

impl Originator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Originator::Local => "local",
            Originator::Remote => "remote",
        }
    }
}

/// Handle to a media track. Cheap to copy around; identity is `id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaTrack {
    pub id: String,
    pub kind: MediaKind,
    /// Capture device the track came from, if local.
    pub device_id: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Device descriptor announced when joining a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub flag: String,
    pub name: String,
    pub version: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            flag: crate::config::DEFAULT_DEVICE_FLAG.to_string(),
            name: crate::config::DEFAULT_DEVICE_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Transport direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportDirection {
    Send,
    Recv,
}

/// One simulcast encoding layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulcastLayer {
    pub rid: &'static str,
    pub max_bitrate: u32,
}

/// Webcam simulcast profile: low 100 kbps, medium 300 kbps, high 1500 kbps.
pub const WEBCAM_SIMULCAST: [SimulcastLayer; 3] = [
    SimulcastLayer {
        rid: "low",
        max_bitrate: 100_000,
    },
    SimulcastLayer {
        rid: "medium",
        max_bitrate: 300_000,
    },
    SimulcastLayer {
        rid: "high",
        max_bitrate: 1_500_000,
    },
];

/// Arguments for [`MediaSession::create_producer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerOptions {
    pub track: MediaTrack,
    /// Source tag (`mic` or `webcam`).
    pub source: String,
    /// Empty when simulcast is off.
    pub simulcast: Vec<SimulcastLayer>,
}

/// Lifecycle events of producers and consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Closed(Originator),
    Paused(Originator),
    Resumed(Originator),
}

/// Events emitted by a remote peer.
#[derive(Clone)]
pub enum PeerEvent {
    Closed,
    NewConsumer(Arc<dyn Consumer>),
}

impl fmt::Debug for PeerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerEvent::Closed => f.write_str("Closed"),
            PeerEvent::NewConsumer(consumer) => f
                .debug_tuple("NewConsumer")
                .field(&consumer.id())
                .finish(),
        }
    }
}

/// Events emitted by the media session.
#[derive(Clone)]
pub enum MediaSessionEvent {
    /// A request that must be relayed to the server; the answer goes back
    /// through `responder`.
    Request { data: Value, responder: Responder },
    /// A fire-and-forget notification to relay to the server.
    Notify { data: Value },
    /// A remote peer joined.
    NewPeer(Arc<dyn RemotePeer>),
}

impl fmt::Debug for MediaSessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaSessionEvent::Request { data, .. } => {
                f.debug_struct("Request").field("data", data).finish()
            }
            MediaSessionEvent::Notify { data } => {
                f.debug_struct("Notify").field("data", data).finish()
            }
            MediaSessionEvent::NewPeer(peer) => {
                f.debug_tuple("NewPeer").field(&peer.name()).finish()
            }
        }
    }
}

/// Local representation of the joined room.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// Join the room. Resolves with the peers already present.
    async fn join(
        &self,
        display_name: &str,
        device: &DeviceInfo,
    ) -> Result<Vec<Arc<dyn RemotePeer>>, MediaError>;

    /// Leave the room (sends a final leave notification).
    fn leave(&self);

    /// Force the session closed without talking to the server.
    fn remote_close(&self, reason: &str) -> Result<(), MediaError>;

    fn create_transport(
        &self,
        direction: TransportDirection,
        tag: &str,
    ) -> Result<Arc<dyn Transport>, MediaError>;

    fn create_producer(&self, options: ProducerOptions) -> Result<Arc<dyn Producer>, MediaError>;

    /// Whether this client may send `kind` in the joined room.
    fn can_send(&self, kind: MediaKind) -> bool;

    /// Feed a server notification into the session.
    async fn receive_notification(&self, data: Value) -> Result<(), MediaError>;

    fn is_joined(&self) -> bool;

    fn subscribe(&self, listener: Listener<MediaSessionEvent>) -> Subscription;
}

/// Send or receive transport.
#[async_trait]
pub trait Transport: Send + Sync {
    fn direction(&self) -> TransportDirection;

    /// Start sending a producer over this transport.
    async fn send(&self, producer: Arc<dyn Producer>) -> Result<(), MediaError>;

    /// Start receiving a consumer. Resolves with the remote track.
    async fn receive(&self, consumer: Arc<dyn Consumer>) -> Result<MediaTrack, MediaError>;

    fn close(&self);
}

/// Locally originated media stream.
#[async_trait]
pub trait Producer: Send + Sync {
    fn id(&self) -> ProducerId;
    fn kind(&self) -> MediaKind;
    fn source(&self) -> String;
    /// Current track (a copy owned by the producer).
    fn track(&self) -> Option<MediaTrack>;
    fn codec(&self) -> Option<String>;
    fn locally_paused(&self) -> bool;
    fn remotely_paused(&self) -> bool;

    /// Pause sending. Emits `Paused(Local)`.
    fn pause(&self);
    /// Resume sending. Emits `Resumed(Local)`.
    fn resume(&self);
    /// Close the producer. Emits `Closed(Local)`.
    fn close(&self);

    /// Swap the producer's track for a copy of `track`, keeping identity.
    async fn replace_track(&self, track: &MediaTrack) -> Result<(), MediaError>;

    fn subscribe(&self, listener: Listener<LifecycleEvent>) -> Subscription;
}

/// Remotely originated media stream.
pub trait Consumer: Send + Sync {
    fn id(&self) -> ConsumerId;
    fn peer_name(&self) -> PeerName;
    fn kind(&self) -> MediaKind;
    fn source(&self) -> String;
    /// Whether this client can decode the stream.
    fn supported(&self) -> bool;
    fn codec(&self) -> Option<String>;
    fn locally_paused(&self) -> bool;
    fn remotely_paused(&self) -> bool;

    fn pause(&self);
    fn resume(&self);

    fn subscribe(&self, listener: Listener<LifecycleEvent>) -> Subscription;
}

/// Another participant in the room.
pub trait RemotePeer: Send + Sync {
    fn name(&self) -> PeerName;
    fn display_name(&self) -> String;
    fn device(&self) -> DeviceInfo;
    fn consumers(&self) -> Vec<Arc<dyn Consumer>>;

    fn subscribe(&self, listener: Listener<PeerEvent>) -> Subscription;
}
