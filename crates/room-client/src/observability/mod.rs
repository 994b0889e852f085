//! Observability for the room client.
//!
//! # Privacy by Default
//!
//! Actor entry points use `#[instrument(skip_all)]` with explicit fields.
//! Display names and notice texts are never used as metric labels; every
//! label below is bounded by an enum.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `room_state_transitions_total` | Counter | `state` | Lifecycle transitions |
//! | `room_join_total` | Counter | `outcome` | Join sequence results |
//! | `room_join_duration_seconds` | Histogram | `outcome` | Join sequence latency |
//! | `room_reconnects_total` | Counter | none | Signaling disconnects handled |
//! | `room_producers_created_total` | Counter | `kind`, `outcome` | Producer creation results |
//! | `room_consumer_receive_total` | Counter | `outcome` | Consumer receive results |
//! | `room_notices_total` | Counter | `level` | User-facing notices |
//! | `room_actor_mailbox_depth` | Gauge | none | Controller backpressure |

pub mod metrics;

pub use metrics::{
    record_consumer_receive, record_join, record_notice, record_producer_created,
    record_reconnect, record_state_transition, set_actor_mailbox_depth,
};
