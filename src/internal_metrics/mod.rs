//! # Internal Metrics Module
//!
//! Thin wrappers over the `metrics` facade for the handful of measurements
//! the relay records, plus installation of the Prometheus recorder whose
//! handle backs the `/metrics` route.
//!
//! When no recorder is installed the `metrics` macros are no-ops, so the
//! recording helpers are safe to call unconditionally.

use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use tracing::error;

/// Registers descriptions for all supported metrics with the global recorder.
pub fn describe() {
    metrics::describe_counter!(
        "pages_dispatched_total",
        Unit::Count,
        "Total number of dispatches, labeled by outcome."
    );
    metrics::describe_counter!(
        "channel_sends_total",
        Unit::Count,
        "Total number of channel send attempts, labeled by channel and outcome."
    );
    metrics::describe_histogram!(
        "channel_send_duration_seconds",
        Unit::Seconds,
        "Latency of a single channel send, labeled by channel."
    );
    metrics::describe_counter!(
        "suggestions_total",
        Unit::Count,
        "Total number of suggestion requests, labeled by outcome."
    );
}

/// Installs the Prometheus recorder as the global recorder.
///
/// Returns `None` if a recorder is already installed or the exporter could
/// not be configured. Failures are logged rather than treated as fatal.
pub fn install() -> Option<PrometheusHandle> {
    let builder = match PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Suffix("duration_seconds".to_string()),
        &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
    ) {
        Ok(builder) => builder,
        Err(e) => {
            error!("Failed to configure Prometheus buckets: {}", e);
            return None;
        }
    };
    let recorder = builder.build_recorder();
    let handle = recorder.handle();

    if let Err(e) = metrics::set_global_recorder(recorder) {
        error!("Failed to install Prometheus recorder: {}", e);
        return None;
    }

    describe();
    Some(handle)
}

/// Records the outcome and latency of one channel send.
pub fn record_channel_send(channel: &str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!("channel_sends_total", "channel" => channel.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("channel_send_duration_seconds", "channel" => channel.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_dispatch(outcome: &'static str) {
    metrics::counter!("pages_dispatched_total", "outcome" => outcome).increment(1);
}

pub fn record_suggestion(outcome: &'static str) {
    metrics::counter!("suggestions_total", "outcome" => outcome).increment(1);
}
