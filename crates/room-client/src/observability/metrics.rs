//! Metrics definitions for the room client.
//!
//! All metrics follow Prometheus naming conventions:
//! - `room_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! Installing a recorder is left to the embedding application; without one
//! the `metrics` facade is a no-op.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a lifecycle state transition.
///
/// Metric: `room_state_transitions_total`
/// Labels: `state` (new, connecting, connected, closed)
pub fn record_state_transition(state: &'static str) {
    counter!("room_state_transitions_total", "state" => state).increment(1);
}

/// Record the outcome and duration of a join sequence.
///
/// Metrics: `room_join_total`, `room_join_duration_seconds`
/// Labels: `outcome` (success, error)
pub fn record_join(outcome: &'static str, duration: Duration) {
    counter!("room_join_total", "outcome" => outcome).increment(1);
    histogram!("room_join_duration_seconds", "outcome" => outcome)
        .record(duration.as_secs_f64());
}

/// Record a handled signaling disconnect.
///
/// Metric: `room_reconnects_total`
pub fn record_reconnect() {
    counter!("room_reconnects_total").increment(1);
}

/// Record a producer creation attempt.
///
/// Metric: `room_producers_created_total`
/// Labels: `kind` (audio, video), `outcome` (success, error)
pub fn record_producer_created(kind: &'static str, outcome: &'static str) {
    counter!("room_producers_created_total", "kind" => kind, "outcome" => outcome).increment(1);
}

/// Record a consumer receive result.
///
/// Metric: `room_consumer_receive_total`
/// Labels: `outcome` (success, error)
pub fn record_consumer_receive(outcome: &'static str) {
    counter!("room_consumer_receive_total", "outcome" => outcome).increment(1);
}

/// Record a user-facing notice.
///
/// Metric: `room_notices_total`
/// Labels: `level` (info, error)
pub fn record_notice(level: &'static str) {
    counter!("room_notices_total", "level" => level).increment(1);
}

/// Set the controller mailbox depth.
///
/// Metric: `room_actor_mailbox_depth`
pub fn set_actor_mailbox_depth(depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("room_actor_mailbox_depth").set(depth as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn test_metrics_without_recorder_do_not_panic() {
        record_state_transition("connecting");
        record_join("success", Duration::from_millis(120));
        record_reconnect();
        record_producer_created("audio", "success");
        record_consumer_receive("error");
        record_notice("info");
        set_actor_mailbox_depth(3);
    }

    #[test]
    fn test_metric_names_and_labels() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_state_transition("connected");
            record_join("error", Duration::from_millis(40));
            record_reconnect();
            record_reconnect();
            record_producer_created("video", "success");
            record_consumer_receive("success");
            record_notice("error");
            set_actor_mailbox_depth(7);
        });

        let metrics = snapshotter.snapshot().into_vec();
        let find = |name: &str| {
            metrics
                .iter()
                .find(|(key, _, _, _)| key.key().name() == name)
                .map(|(key, _, _, value)| (key.kind(), key.key().labels().count(), value.clone()))
        };

        let (kind, labels, value) = find("room_reconnects_total").unwrap();
        assert_eq!(kind, MetricKind::Counter);
        assert_eq!(labels, 0);
        assert_eq!(*value, DebugValue::Counter(2));

        let (kind, labels, _) = find("room_producers_created_total").unwrap();
        assert_eq!(kind, MetricKind::Counter);
        assert_eq!(labels, 2);

        let (kind, _, _) = find("room_join_duration_seconds").unwrap();
        assert_eq!(kind, MetricKind::Histogram);

        let (kind, _, value) = find("room_actor_mailbox_depth").unwrap();
        assert_eq!(kind, MetricKind::Gauge);
        assert_eq!(*value, DebugValue::Gauge(7.0.into()));

        assert!(find("room_state_transitions_total").is_some());
        assert!(find("room_join_total").is_some());
        assert!(find("room_consumer_receive_total").is_some());
        assert!(find("room_notices_total").is_some());
    }
}
