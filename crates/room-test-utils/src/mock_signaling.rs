//! Mock signaling session.
//!
//! By default `open()` emits `Open` straight away, which is what a
//! controller under test needs to run its join sequence. Lifecycle events
//! and inbound requests can also be scripted by the test.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockSignaling;
//!
//! let signaling = MockSignaling::builder()
//!     .fail_method("change-display-name", SignalingError::Timeout)
//!     .build();
//!
//! // Later, simulate a dropped connection
//! signaling.emit_disconnected();
//! ```

use async_trait::async_trait;
use room_client::errors::SignalingError;
use room_client::signaling::{
    InboundRequest, Response, Responder, SignalingEvent, SignalingSession,
};
use room_client::subscription::{EventEmitter, Listener, Subscription};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

/// A request sent through the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct SentRequest {
    pub method: String,
    pub data: Value,
}

#[derive(Debug, Default)]
struct SignalingState {
    open_calls: usize,
    close_calls: usize,
    sent: Vec<SentRequest>,
    failures: HashMap<String, SignalingError>,
    responses: HashMap<String, Value>,
}

/// Mock signaling session.
#[derive(Debug)]
pub struct MockSignaling {
    auto_open: bool,
    events: EventEmitter<SignalingEvent>,
    state: Mutex<SignalingState>,
}

impl Default for MockSignaling {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl MockSignaling {
    /// Create a new MockSignaling builder.
    #[must_use]
    pub fn builder() -> MockSignalingBuilder {
        MockSignalingBuilder {
            auto_open: true,
            state: SignalingState::default(),
        }
    }

    /// Create a MockSignaling that opens automatically.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit_open(&self) {
        self.events.emit(SignalingEvent::Open);
    }

    pub fn emit_disconnected(&self) {
        self.events.emit(SignalingEvent::Disconnected);
    }

    pub fn emit_close(&self) {
        self.events.emit(SignalingEvent::Close);
    }

    /// Deliver an inbound request; the answer arrives on the returned receiver.
    pub fn inbound_request(&self, method: &str, data: Value) -> oneshot::Receiver<Response> {
        let (responder, rx) = Responder::channel();
        self.events.emit(SignalingEvent::Request(InboundRequest {
            method: method.to_string(),
            data,
            responder,
        }));
        rx
    }

    /// Make every later request with `method` fail with `error`.
    pub fn set_failure(&self, method: &str, error: SignalingError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(method.to_string(), error);
    }

    /// Stop failing requests with `method`.
    pub fn clear_failure(&self, method: &str) {
        self.state.lock().unwrap().failures.remove(method);
    }

    /// Every request sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<SentRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Requests sent with `method`, in order.
    #[must_use]
    pub fn sent_with_method(&self, method: &str) -> Vec<SentRequest> {
        self.sent()
            .into_iter()
            .filter(|request| request.method == method)
            .collect()
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().open_calls
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.events.listener_count()
    }
}

#[async_trait]
impl SignalingSession for MockSignaling {
    fn open(&self) {
        self.state.lock().unwrap().open_calls += 1;
        if self.auto_open {
            self.emit_open();
        }
    }

    async fn send(&self, method: &str, data: Value) -> Result<Value, SignalingError> {
        let mut state = self.state.lock().unwrap();
        state.sent.push(SentRequest {
            method: method.to_string(),
            data,
        });
        if let Some(error) = state.failures.get(method) {
            return Err(error.clone());
        }
        Ok(state.responses.get(method).cloned().unwrap_or(Value::Null))
    }

    fn close(&self) {
        self.state.lock().unwrap().close_calls += 1;
    }

    fn subscribe(&self, listener: Listener<SignalingEvent>) -> Subscription {
        self.events.subscribe(listener)
    }
}

/// Builder for MockSignaling configuration.
#[derive(Debug)]
pub struct MockSignalingBuilder {
    auto_open: bool,
    state: SignalingState,
}

impl MockSignalingBuilder {
    /// Do not emit `Open` from `open()`; the test calls `emit_open` itself.
    #[must_use]
    pub fn manual_open(mut self) -> Self {
        self.auto_open = false;
        self
    }

    /// Fail every request with `method`.
    #[must_use]
    pub fn fail_method(mut self, method: &str, error: SignalingError) -> Self {
        self.state.failures.insert(method.to_string(), error);
        self
    }

    /// Answer requests with `method` with `response`.
    #[must_use]
    pub fn respond_with(mut self, method: &str, response: Value) -> Self {
        self.state.responses.insert(method.to_string(), response);
        self
    }

    /// Build the MockSignaling.
    #[must_use]
    pub fn build(self) -> MockSignaling {
        MockSignaling {
            auto_open: self.auto_open,
            events: EventEmitter::new(),
            state: Mutex::new(self.state),
        }
    }
}
