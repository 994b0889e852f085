//! Message types for the room controller actor.
//!
//! Two mailboxes feed the actor:
//! - [`RoomMessage`]: user commands from [`super::RoomControllerHandle`],
//!   each carrying a `respond_to` channel.
//! - [`RoomEvent`]: events posted by collaborator listeners. Events tied to
//!   one connection cycle carry its epoch so late deliveries from an
//!   earlier cycle can be discarded.

use crate::devices::WebcamSelection;
use crate::errors::{MediaError, RoomError};
use crate::events::{ConsumerInfo, MediaCapabilities, PeerInfo, ProducerInfo, RoomState};
use crate::media::{LifecycleEvent, MediaKind, MediaTrack, PeerEvent, RemotePeer};
use common::types::{ConsumerId, PeerName, ProducerId};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Reply channel for user commands.
pub type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// User commands handled by the room controller.
#[derive(Debug)]
pub enum RoomMessage {
    SetDisplayName {
        display_name: String,
        respond_to: Reply<()>,
    },
    MuteMic {
        respond_to: Reply<()>,
    },
    UnmuteMic {
        respond_to: Reply<()>,
    },
    AddWebcam {
        respond_to: Reply<()>,
    },
    RemoveWebcam {
        respond_to: Reply<()>,
    },
    CycleWebcamDevice {
        respond_to: Reply<()>,
    },
    CycleWebcamResolution {
        respond_to: Reply<()>,
    },
    EnableAudioOnly {
        respond_to: Reply<()>,
    },
    DisableAudioOnly {
        respond_to: Reply<()>,
    },
    Close {
        respond_to: Reply<()>,
    },
    GetState {
        respond_to: Reply<RoomSnapshot>,
    },
}

/// Signaling lifecycle events forwarded to the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingLifecycle {
    Open,
    Disconnected,
    Close,
}

/// Collaborator events posted to the actor by listeners.
pub enum RoomEvent {
    Signaling(SignalingLifecycle),
    NewPeer {
        epoch: u64,
        peer: Arc<dyn RemotePeer>,
    },
    Peer {
        epoch: u64,
        peer_name: PeerName,
        event: PeerEvent,
    },
    Consumer {
        epoch: u64,
        consumer_id: ConsumerId,
        event: LifecycleEvent,
    },
    ConsumerTrack {
        epoch: u64,
        consumer_id: ConsumerId,
        result: Result<MediaTrack, MediaError>,
    },
    Producer {
        producer_id: ProducerId,
        event: LifecycleEvent,
    },
}

impl RoomEvent {
    /// Short name for log fields.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            RoomEvent::Signaling(SignalingLifecycle::Open) => "signaling_open",
            RoomEvent::Signaling(SignalingLifecycle::Disconnected) => "signaling_disconnected",
            RoomEvent::Signaling(SignalingLifecycle::Close) => "signaling_close",
            RoomEvent::NewPeer { .. } => "new_peer",
            RoomEvent::Peer { .. } => "peer",
            RoomEvent::Consumer { .. } => "consumer",
            RoomEvent::ConsumerTrack { .. } => "consumer_track",
            RoomEvent::Producer { .. } => "producer",
        }
    }
}

impl fmt::Debug for RoomEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Derived copy of the controller's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: String,
    pub peer_name: PeerName,
    pub display_name: String,
    pub state: RoomState,
    pub capabilities: MediaCapabilities,
    pub can_change_webcam: bool,
    pub webcam_in_progress: bool,
    pub audio_only: bool,
    pub audio_only_in_progress: bool,
    pub webcam: WebcamSelection,
    pub producers: Vec<ProducerInfo>,
    pub peers: Vec<PeerInfo>,
    pub consumers: Vec<ConsumerInfo>,
}

impl RoomSnapshot {
    #[must_use]
    pub fn producer(&self, kind: MediaKind) -> Option<&ProducerInfo> {
        self.producers.iter().find(|p| p.kind == kind)
    }

    #[must_use]
    pub fn peer(&self, name: &str) -> Option<&PeerInfo> {
        self.peers.iter().find(|p| p.name.as_str() == name)
    }

    #[must_use]
    pub fn consumer(&self, id: &str) -> Option<&ConsumerInfo> {
        self.consumers.iter().find(|c| c.id.as_str() == id)
    }
}
