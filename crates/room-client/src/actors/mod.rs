//! Actor implementation for the room controller.
//!
//! ```text
//! RoomControllerActor (one per room session)
//! ├── owns connection state, local producers, webcam selection
//! ├── owns the remote peer/consumer registry
//! └── Relay (media-session request/notification plumbing)
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single owner**: All session state is mutated on the actor task only
//! - **Two mailboxes**: User commands (bounded) and collaborator events
//!   (unbounded, drained first)
//! - **Epoch fencing**: Per-cycle events carry the cycle number and are
//!   discarded once a disconnect bumps it
//! - **Relay off the actor**: Media-session requests issued while joining
//!   are relayed without waiting on the actor
//!
//! # Modules
//!
//! - [`room`] - `RoomControllerActor` and its handle
//! - [`messages`] - Commands, collaborator events and the state snapshot
//! - [`metrics`] - Mailbox monitoring
//! - `producers` - Local producer lifecycle
//! - `peers` - Remote peer and consumer registry
//! - `webcam` - Webcam device/resolution cycling and audio-only mode

pub mod messages;
pub mod metrics;
mod peers;
mod producers;
pub mod room;
mod webcam;

pub use messages::{RoomMessage, RoomSnapshot};
pub use metrics::{MailboxLevel, MailboxMonitor};
pub use room::{RoomCollaborators, RoomControllerActor, RoomControllerHandle, DEFAULT_DISPLAY_NAME};
