//! Metric definitions. All names carry the `biz_` prefix; counters end in
//! `_total` and duration histograms in `_seconds`.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the Prometheus recorder and return the handle `/metrics` renders.
///
/// Must run before anything is recorded.
///
/// # Errors
///
/// Returns error if a recorder is already installed.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // ISLB calls are internal RPCs bounded by the configured timeout
        .set_buckets_for_metric(
            Matcher::Prefix("biz_islb".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000,
                10.000,
            ],
        )
        .map_err(|e| format!("Failed to set ISLB latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

/// Metric: `biz_rooms_active`
pub fn set_rooms_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("biz_rooms_active").set(count as f64);
}

/// Metric: `biz_peers_active`
pub fn set_peers_active(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!("biz_peers_active").set(count as f64);
}

/// Count one inbound signal request.
///
/// Metric: `biz_signal_requests_total`
/// Labels: `request_type` (join, leave, msg)
pub fn record_signal_request(request_type: &'static str) {
    counter!("biz_signal_requests_total", "request_type" => request_type).increment(1);
}

/// Count one Join outcome.
///
/// Metric: `biz_join_total`
/// Labels: `outcome` (success, invalid, islb_not_found, node_not_found,
/// rpc_error, already_joined, error)
pub fn record_join(outcome: &'static str) {
    counter!("biz_join_total", "outcome" => outcome).increment(1);
}

/// Count a reply a room could not push into a peer's mailbox.
///
/// Metric: `biz_messages_dropped_total`
/// Labels: `reason` (mailbox_full, mailbox_closed)
///
/// A rising `mailbox_full` rate means clients are not draining their streams.
pub fn record_message_dropped(reason: &'static str) {
    counter!("biz_messages_dropped_total", "reason" => reason).increment(1);
}

/// Metric: `biz_topology_events_total`
/// Labels: `outcome` (routed, no_room)
pub fn record_topology_event(outcome: &'static str) {
    counter!("biz_topology_events_total", "outcome" => outcome).increment(1);
}

/// Record ISLB RPC latency, errors and timeouts included.
///
/// Metric: `biz_islb_rpc_duration_seconds`
/// Labels: `operation` (find_node, watch_event)
pub fn record_islb_rpc_latency(operation: &'static str, duration: Duration) {
    histogram!("biz_islb_rpc_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};
    use metrics_util::MetricKind;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        set_rooms_active(0);
        set_peers_active(10);
        record_signal_request("join");
        record_join("success");
        record_message_dropped("mailbox_full");
        record_topology_event("no_room");
        record_islb_rpc_latency("find_node", Duration::from_millis(3));
    }

    #[test]
    fn test_counters_and_gauges_are_recorded() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_join("success");
            record_join("success");
            record_join("islb_not_found");
            record_message_dropped("mailbox_full");
            set_rooms_active(3);
            record_islb_rpc_latency("find_node", Duration::from_millis(20));
        });

        let snapshot = snapshotter.snapshot().into_vec();
        let find = |name: &str, label: Option<(&str, &str)>| {
            snapshot
                .iter()
                .find(|(key, _, _, _)| {
                    let key = key.key();
                    key.name() == name
                        && label.map_or(true, |(k, v)| {
                            key.labels().any(|l| l.key() == k && l.value() == v)
                        })
                })
                .map(|(key, _, _, value)| (key.kind(), value))
        };

        assert_eq!(
            find("biz_join_total", Some(("outcome", "success"))),
            Some((MetricKind::Counter, &DebugValue::Counter(2)))
        );
        assert_eq!(
            find("biz_join_total", Some(("outcome", "islb_not_found"))),
            Some((MetricKind::Counter, &DebugValue::Counter(1)))
        );
        assert_eq!(
            find("biz_messages_dropped_total", Some(("reason", "mailbox_full"))),
            Some((MetricKind::Counter, &DebugValue::Counter(1)))
        );
        assert!(matches!(
            find("biz_rooms_active", None),
            Some((MetricKind::Gauge, DebugValue::Gauge(v))) if v.into_inner() == 3.0
        ));
        assert!(matches!(
            find("biz_islb_rpc_duration_seconds", Some(("operation", "find_node"))),
            Some((MetricKind::Histogram, DebugValue::Histogram(samples))) if samples.len() == 1
        ));
    }
}
