//! Prometheus Metrics Module
//!
//! Exposes feed metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: Frames received and frames that failed to decode
//! - **Pipeline**: Normalize failures by reason, events published and filtered
//! - **Connections**: Adapter state per exchange and reconnect attempts
//! - **Consumers**: Registered consumers and events dropped for slow ones
//! - **Alerts**: Webhook deliveries and failures
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the HTTP server port.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::streaming::AdapterState;
use crate::domain::trade::Exchange;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Later calls return the same handle.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "liquidation_feed_frames_received_total",
        "Frames received from exchange WebSockets while streaming"
    );
    describe_counter!(
        "liquidation_feed_decode_failures_total",
        "Frames that were not valid JSON"
    );
    describe_counter!(
        "liquidation_feed_normalize_failures_total",
        "Payloads that did not map to a trade event, by reason"
    );
    describe_counter!(
        "liquidation_feed_events_published_total",
        "Events handed to the broadcaster"
    );
    describe_counter!(
        "liquidation_feed_events_filtered_total",
        "Events rejected by the filter"
    );
    describe_counter!(
        "liquidation_feed_consumer_dropped_events_total",
        "Events dropped for consumers that fell behind"
    );
    describe_counter!(
        "liquidation_feed_reconnects_total",
        "Exchange reconnection attempts"
    );
    describe_counter!(
        "liquidation_feed_alerts_sent_total",
        "Alerts delivered to the webhook"
    );
    describe_counter!(
        "liquidation_feed_alerts_failed_total",
        "Alerts the webhook rejected or that could not be sent"
    );

    describe_gauge!(
        "liquidation_feed_adapter_state",
        "Adapter state (0=disconnected 1=connecting 2=subscribing 3=streaming 4=backoff)"
    );
    describe_gauge!(
        "liquidation_feed_consumers",
        "Number of registered downstream consumers"
    );

    describe_histogram!(
        "liquidation_feed_pipeline_seconds",
        "Time from payload receipt to broadcast"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a frame received from an exchange.
pub fn record_frame_received(exchange: Exchange) {
    counter!(
        "liquidation_feed_frames_received_total",
        "exchange" => exchange.label()
    )
    .increment(1);
}

/// Record a frame that failed JSON decoding.
pub fn record_decode_failure(exchange: Exchange) {
    counter!(
        "liquidation_feed_decode_failures_total",
        "exchange" => exchange.label()
    )
    .increment(1);
}

/// Record a payload the normalizer rejected.
pub fn record_normalize_failure(exchange: Exchange, reason: &'static str) {
    counter!(
        "liquidation_feed_normalize_failures_total",
        "exchange" => exchange.label(),
        "reason" => reason
    )
    .increment(1);
}

/// Record an event handed to the broadcaster.
pub fn record_event_published(exchange: Exchange) {
    counter!(
        "liquidation_feed_events_published_total",
        "exchange" => exchange.label()
    )
    .increment(1);
}

/// Record an event rejected by the filter.
pub fn record_event_filtered(exchange: Exchange) {
    counter!(
        "liquidation_feed_events_filtered_total",
        "exchange" => exchange.label()
    )
    .increment(1);
}

/// Record events dropped for a lagging consumer.
pub fn record_consumer_dropped(count: u64) {
    counter!("liquidation_feed_consumer_dropped_events_total").increment(count);
}

/// Record a reconnection attempt.
pub fn record_reconnect(exchange: Exchange) {
    counter!(
        "liquidation_feed_reconnects_total",
        "exchange" => exchange.label()
    )
    .increment(1);
}

/// Record an alert delivery outcome.
pub fn record_alert(delivered: bool) {
    if delivered {
        counter!("liquidation_feed_alerts_sent_total").increment(1);
    } else {
        counter!("liquidation_feed_alerts_failed_total").increment(1);
    }
}

/// Update the adapter state gauge for an exchange.
pub fn set_adapter_state(exchange: Exchange, state: AdapterState) {
    gauge!(
        "liquidation_feed_adapter_state",
        "exchange" => exchange.label()
    )
    .set(f64::from(state.code()));
}

/// Update the registered consumer count.
#[allow(clippy::cast_precision_loss)]
pub fn set_consumers(count: usize) {
    gauge!("liquidation_feed_consumers").set(count as f64);
}

/// Record time spent turning one payload into a broadcast.
pub fn record_pipeline_duration(exchange: Exchange, duration: Duration) {
    histogram!(
        "liquidation_feed_pipeline_seconds",
        "exchange" => exchange.label()
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
