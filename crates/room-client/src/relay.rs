//! Glue between the media session and the signaling session.
//!
//! Media-session requests and notifications are relayed to the server, and
//! inbound server notifications are fed back into the media session. None of
//! this goes through the controller mailbox: the join sequence itself waits
//! on relayed requests while the controller is busy running it.
//!
//! Each direction is drained by its own task, in order.

use crate::errors::SignalingError;
use crate::media::MediaSession;
use crate::signaling::{
    InboundRequest, Responder, SignalingSession, METHOD_MEDIA_NOTIFICATION, METHOD_MEDIA_REQUEST,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Code used to reject inbound requests with an unknown method.
pub const UNKNOWN_METHOD_CODE: u16 = 404;

/// Reason used to reject inbound requests with an unknown method.
pub const UNKNOWN_METHOD_REASON: &str = "unknown method";

/// Code used when a relayed request fails without a server error code.
const RELAY_FAILURE_CODE: u16 = 500;

enum OutboundJob {
    Request { data: Value, responder: Responder },
    Notification { data: Value },
}

/// Cloneable handle to the relay tasks. All methods are synchronous so they
/// can be called from collaborator listeners.
#[derive(Clone)]
pub struct Relay {
    outbound: mpsc::UnboundedSender<OutboundJob>,
    inbound: mpsc::UnboundedSender<Value>,
}

impl Relay {
    /// Start the relay tasks. They stop when `cancel_token` is cancelled or
    /// every `Relay` clone is dropped.
    pub fn spawn(
        signaling: Arc<dyn SignalingSession>,
        media: Arc<dyn MediaSession>,
        cancel_token: CancellationToken,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_outbound(signaling, outbound_rx, cancel_token.clone()));
        tokio::spawn(run_inbound(media, inbound_rx, cancel_token));

        Self { outbound, inbound }
    }

    /// Relay a media-session request; the server's answer goes to `responder`.
    pub fn forward_request(&self, data: Value, responder: Responder) {
        if let Err(mpsc::error::SendError(job)) =
            self.outbound.send(OutboundJob::Request { data, responder })
        {
            if let OutboundJob::Request { responder, .. } = job {
                responder.reject(RELAY_FAILURE_CODE, "relay stopped");
            }
        }
    }

    /// Relay a media-session notification.
    pub fn forward_notification(&self, data: Value) {
        if self
            .outbound
            .send(OutboundJob::Notification { data })
            .is_err()
        {
            debug!(target: "room.relay", "Relay stopped, dropping media notification");
        }
    }

    /// Answer a request from the server.
    ///
    /// Only media notifications are recognized: they are accepted and fed to
    /// the media session. Anything else is rejected with
    /// [`UNKNOWN_METHOD_CODE`] and touches no state.
    pub fn handle_inbound_request(&self, request: InboundRequest) {
        let InboundRequest {
            method,
            data,
            responder,
        } = request;

        if method == METHOD_MEDIA_NOTIFICATION {
            responder.accept(Value::Null);
            if self.inbound.send(data).is_err() {
                debug!(target: "room.relay", "Relay stopped, dropping inbound notification");
            }
        } else {
            warn!(
                target: "room.relay",
                method = %method,
                "Rejecting inbound request with unknown method"
            );
            responder.reject(UNKNOWN_METHOD_CODE, UNKNOWN_METHOD_REASON);
        }
    }
}

async fn run_outbound(
    signaling: Arc<dyn SignalingSession>,
    mut receiver: mpsc::UnboundedReceiver<OutboundJob>,
    cancel_token: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            () = cancel_token.cancelled() => break,
            job = receiver.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        match job {
            OutboundJob::Request { data, responder } => {
                match signaling.send(METHOD_MEDIA_REQUEST, data).await {
                    Ok(response) => {
                        responder.accept(response);
                    }
                    Err(e) => {
                        warn!(target: "room.relay", error = %e, "Relayed media request failed");
                        let (code, reason) = match e {
                            SignalingError::Rejected { code, reason } => (code, reason),
                            other => (RELAY_FAILURE_CODE, other.to_string()),
                        };
                        responder.reject(code, reason);
                    }
                }
            }
            OutboundJob::Notification { data } => {
                if let Err(e) = signaling.send(METHOD_MEDIA_NOTIFICATION, data).await {
                    debug!(target: "room.relay", error = %e, "Relayed media notification failed");
                }
            }
        }
    }
    debug!(target: "room.relay", "Outbound relay stopped");
}

async fn run_inbound(
    media: Arc<dyn MediaSession>,
    mut receiver: mpsc::UnboundedReceiver<Value>,
    cancel_token: CancellationToken,
) {
    loop {
        let data = tokio::select! {
            () = cancel_token.cancelled() => break,
            data = receiver.recv() => match data {
                Some(data) => data,
                None => break,
            },
        };

        if let Err(e) = media.receive_notification(data).await {
            warn!(target: "room.relay", error = %e, "Media session rejected server notification");
        }
    }
    debug!(target: "room.relay", "Inbound relay stopped");
}
