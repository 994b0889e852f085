//! Room Client Library
//!
//! Client-side session orchestration for a multi-party audio/video room:
//!
//! - Connection lifecycle (`new -> connecting -> connected -> closed`)
//!   with automatic rejoin after a signaling disconnect
//! - Join sequence against an SFU media session
//! - Local microphone and webcam producers, with webcam device and
//!   resolution cycling (rolled back on failure)
//! - Remote peer and consumer registration
//! - Discrete state updates for a UI layer
//!
//! # Architecture
//!
//! ```text
//! RoomControllerHandle ──commands──▶ RoomControllerActor ──▶ StateSink
//!                                      ▲        │
//!        SignalingSession ──events─────┤        ├──▶ MediaSession
//!        MediaSession ─────events──────┘        └──▶ MediaDevices
//! ```
//!
//! Signaling, media and device access are traits; the crate contains no
//! transport or codec code.
//!
//! # Modules
//!
//! - [`actors`] - The room controller actor
//! - [`config`] - Client configuration from environment
//! - [`devices`] - Camera catalog, resolution tiers and capture requests
//! - [`errors`] - Error types with error codes and user-facing messages
//! - [`events`] - State updates published to the UI
//! - [`media`] - Media session, transport, producer and consumer traits
//! - [`preferences`] - Persisted user preferences
//! - [`relay`] - Signaling/media-session request relay
//! - [`signaling`] - Signaling session trait and inbound requests
//! - [`subscription`] - Listener registration with drop-to-unsubscribe

pub mod actors;
pub mod config;
pub mod devices;
pub mod errors;
pub mod events;
pub mod media;
pub mod observability;
pub mod preferences;
pub mod relay;
pub mod signaling;
pub mod subscription;

pub use actors::{RoomCollaborators, RoomControllerHandle, RoomSnapshot};
pub use config::Config;
pub use errors::RoomError;
pub use events::{StateSink, StateUpdate};
