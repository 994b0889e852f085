//! Signaling session contract.
//!
//! The signaling session is the persistent request/notification channel to
//! the room server. Its own reconnection policy lives behind this trait; the
//! controller only observes lifecycle events and sends requests.

use crate::errors::SignalingError;
use crate::subscription::{Listener, Subscription};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::oneshot;

/// Outbound request relaying a media-session request.
pub const METHOD_MEDIA_REQUEST: &str = "mediasoup-request";

/// Outbound (and the single recognized inbound) media-session notification.
pub const METHOD_MEDIA_NOTIFICATION: &str = "mediasoup-notification";

/// Outbound display-name change request.
pub const METHOD_CHANGE_DISPLAY_NAME: &str = "change-display-name";

/// Rejection carried back to whoever issued a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code} {reason}")]
pub struct Rejection {
    pub code: u16,
    pub reason: String,
}

/// Outcome delivered through a [`Responder`].
pub type Response = Result<Value, Rejection>;

/// One-shot reply handle for a request.
///
/// Cloneable so it can travel inside broadcast events; only the first
/// `accept`/`reject` is delivered.
#[derive(Clone)]
pub struct Responder {
    sender: Arc<Mutex<Option<oneshot::Sender<Response>>>>,
}

impl Responder {
    /// Create a responder and the receiver its answer arrives on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Answer successfully. Returns `false` if already answered.
    pub fn accept(&self, data: Value) -> bool {
        self.respond(Ok(data))
    }

    /// Answer with an error code and reason. Returns `false` if already answered.
    pub fn reject(&self, code: u16, reason: impl Into<String>) -> bool {
        self.respond(Err(Rejection {
            code,
            reason: reason.into(),
        }))
    }

    fn respond(&self, response: Response) -> bool {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match sender {
            Some(tx) => tx.send(response).is_ok(),
            None => false,
        }
    }

    /// Whether an answer has already been given.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("answered", &self.is_answered())
            .finish()
    }
}

/// Request received from the server.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: String,
    pub data: Value,
    pub responder: Responder,
}

/// Events emitted by the signaling session.
#[derive(Debug, Clone)]
pub enum SignalingEvent {
    /// The channel is open (first connect or after a reconnect).
    Open,
    /// The channel dropped; the session will try to reconnect on its own.
    Disconnected,
    /// The channel is closed for good.
    Close,
    /// The server sent a request.
    Request(InboundRequest),
}

/// Persistent request/notification channel to the room server.
#[async_trait]
pub trait SignalingSession: Send + Sync {
    /// Start connecting. `Open` is emitted once the channel is usable.
    fn open(&self);

    /// Send a request and wait for its response.
    async fn send(&self, method: &str, data: Value) -> Result<Value, SignalingError>;

    /// Close the channel.
    fn close(&self);

    fn subscribe(&self, listener: Listener<SignalingEvent>) -> Subscription;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_responder_delivers_first_answer_only() {
        let (responder, rx) = Responder::channel();
        let clone = responder.clone();

        assert!(responder.accept(json!({"ok": true})));
        assert!(!clone.reject(500, "too late"));
        assert!(clone.is_answered());

        assert_eq!(rx.await.unwrap(), Ok(json!({"ok": true})));
    }

    #[tokio::test]
    async fn test_responder_reject() {
        let (responder, rx) = Responder::channel();
        responder.reject(404, "unknown method");

        let rejection = rx.await.unwrap().unwrap_err();
        assert_eq!(rejection.code, 404);
        assert_eq!(rejection.to_string(), "404 unknown method");
    }
}
