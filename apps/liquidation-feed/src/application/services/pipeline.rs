//! Per-exchange Event Pipeline
//!
//! Receives an adapter's events in order and turns payloads into broadcasts:
//!
//! ```text
//! AdapterEvent::Payload ──► normalize ──► filter ──► Broadcaster::publish
//! ```
//!
//! Lifecycle events update the exchange's [`ExchangeStatus`]. Nothing here
//! can fail the task; rejected payloads are counted and dropped.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::filter::SharedFilter;
use crate::domain::streaming::{AdapterState, ExchangeStatus};
use crate::domain::trade::Exchange;
use crate::infrastructure::broadcast::SharedBroadcaster;
use crate::infrastructure::exchange::{AdapterEvent, NormalizeError, normalize};
use crate::infrastructure::metrics;

/// What happened to a single adapter event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    /// Lifecycle change recorded.
    Lifecycle(AdapterState),
    /// Reconnect attempts and last error cleared.
    Recovered,
    /// Event accepted and queued for this many consumers.
    Published(usize),
    /// Event rejected by the filter.
    Filtered,
    /// Payload did not map to an event.
    Rejected(NormalizeError),
    /// Frame was not valid JSON.
    Undecodable,
}

/// Normalize → filter → publish for one exchange.
#[derive(Debug, Clone)]
pub struct Pipeline {
    exchange: Exchange,
    filter: SharedFilter,
    broadcaster: SharedBroadcaster,
    status: Arc<ExchangeStatus>,
}

impl Pipeline {
    /// Create a pipeline for `exchange`.
    #[must_use]
    pub const fn new(
        exchange: Exchange,
        filter: SharedFilter,
        broadcaster: SharedBroadcaster,
        status: Arc<ExchangeStatus>,
    ) -> Self {
        Self {
            exchange,
            filter,
            broadcaster,
            status,
        }
    }

    /// Consume adapter events until the adapter drops its sender.
    pub async fn run(self, mut events: mpsc::Receiver<AdapterEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        tracing::debug!(exchange = %self.exchange, "Pipeline finished");
    }

    /// Process one adapter event.
    pub fn handle(&self, event: AdapterEvent) -> PipelineOutcome {
        match event {
            AdapterEvent::State(state) => {
                self.set_state(state);
                PipelineOutcome::Lifecycle(state)
            }
            AdapterEvent::Backoff { reason, .. } => {
                self.status.set_error(reason);
                self.status.increment_reconnect_attempts();
                metrics::record_reconnect(self.exchange);
                self.set_state(AdapterState::Backoff);
                PipelineOutcome::Lifecycle(AdapterState::Backoff)
            }
            AdapterEvent::Stable => {
                self.status.mark_stable();
                tracing::debug!(exchange = %self.exchange, "Connection stable");
                PipelineOutcome::Recovered
            }
            AdapterEvent::Payload(payload) => {
                self.status.increment_frames();
                metrics::record_frame_received(self.exchange);
                self.process(&payload)
            }
            AdapterEvent::DecodeFailed(_) => {
                self.status.increment_frames();
                self.status.increment_decode_failures();
                metrics::record_frame_received(self.exchange);
                metrics::record_decode_failure(self.exchange);
                PipelineOutcome::Undecodable
            }
        }
    }

    fn process(&self, payload: &Value) -> PipelineOutcome {
        let started = Instant::now();

        let event = match normalize(self.exchange, payload) {
            Ok(event) => event,
            Err(e) => {
                self.status.increment_normalize_failures();
                metrics::record_normalize_failure(self.exchange, e.reason());
                tracing::debug!(exchange = %self.exchange, reason = e.reason(), error = %e, "Payload dropped");
                return PipelineOutcome::Rejected(e);
            }
        };

        if !self.filter.accept(&event) {
            self.status.increment_filtered();
            metrics::record_event_filtered(self.exchange);
            return PipelineOutcome::Filtered;
        }

        self.status.increment_published();
        metrics::record_event_published(self.exchange);
        let delivered = self.broadcaster.publish(&event);
        metrics::record_pipeline_duration(self.exchange, started.elapsed());
        tracing::debug!(
            exchange = %self.exchange,
            symbol = event.symbol(),
            side = %event.side(),
            notional = %event.notional(),
            delivered,
            "Event published"
        );

        PipelineOutcome::Published(delivered)
    }

    fn set_state(&self, state: AdapterState) {
        self.status.set_state(state);
        metrics::set_adapter_state(self.exchange, state);
        tracing::info!(exchange = %self.exchange, state = state.as_str(), "Adapter state changed");
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;
    use crate::domain::filter::{FilterConfig, FilterHandle};
    use crate::infrastructure::broadcast::Broadcaster;

    fn binance(price: &str, qty: &str) -> AdapterEvent {
        AdapterEvent::Payload(json!({
            "e": "forceOrder",
            "o": {"s": "BTCUSDT", "S": "SELL", "p": price, "q": qty, "T": 1_700_000_000_000_i64}
        }))
    }

    fn pipeline(minimum: i64) -> (Pipeline, SharedBroadcaster, Arc<ExchangeStatus>) {
        let filter = Arc::new(FilterHandle::new(
            FilterConfig::allow_all().with_minimum_notional(Decimal::from(minimum)),
        ));
        let broadcaster = Arc::new(Broadcaster::new(16));
        let status = Arc::new(ExchangeStatus::new(Exchange::Binance));
        let pipeline = Pipeline::new(
            Exchange::Binance,
            filter,
            Arc::clone(&broadcaster),
            Arc::clone(&status),
        );
        (pipeline, broadcaster, status)
    }

    #[tokio::test]
    async fn accepted_event_reaches_consumers() {
        let (pipeline, broadcaster, status) = pipeline(500);
        let mut consumer = broadcaster.register("test").unwrap();

        assert_eq!(
            pipeline.handle(binance("50000.00", "0.01")),
            PipelineOutcome::Published(1)
        );

        let event = consumer.recv().await.unwrap();
        assert_eq!(event.notional(), Decimal::new(50_000, 2));
        assert_eq!(status.snapshot().events_published, 1);
        assert_eq!(status.snapshot().frames_received, 1);
    }

    #[test]
    fn small_event_is_filtered() {
        let (pipeline, _broadcaster, status) = pipeline(750);
        assert_eq!(
            pipeline.handle(binance("50000.00", "0.01")),
            PipelineOutcome::Filtered
        );
        assert_eq!(status.snapshot().events_filtered, 1);
    }

    #[test]
    fn malformed_payload_is_counted() {
        let (pipeline, _broadcaster, status) = pipeline(0);
        let outcome = pipeline.handle(AdapterEvent::Payload(json!({"o": {"s": "BTCUSDT"}})));
        assert!(matches!(outcome, PipelineOutcome::Rejected(_)));

        pipeline.handle(AdapterEvent::DecodeFailed("expected value".to_string()));
        let snapshot = status.snapshot();
        assert_eq!(snapshot.normalize_failures, 1);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.frames_received, 2);
    }

    #[tokio::test]
    async fn overflowing_payload_does_not_stop_the_pipeline() {
        let (pipeline, broadcaster, status) = pipeline(0);
        let mut consumer = broadcaster.register("test").unwrap();

        assert!(matches!(
            pipeline.handle(binance("79228162514264337593543950335", "10")),
            PipelineOutcome::Rejected(NormalizeError::InvalidTrade(_))
        ));

        assert_eq!(
            pipeline.handle(binance("50000.00", "0.01")),
            PipelineOutcome::Published(1)
        );
        assert_eq!(consumer.recv().await.unwrap().symbol(), "BTCUSDT");
        assert_eq!(status.snapshot().normalize_failures, 1);
    }

    #[test]
    fn lifecycle_updates_status() {
        let (pipeline, _broadcaster, status) = pipeline(0);
        pipeline.handle(AdapterEvent::State(AdapterState::Connecting));
        assert_eq!(status.state(), AdapterState::Connecting);

        pipeline.handle(AdapterEvent::Backoff {
            attempt: 1,
            delay: std::time::Duration::from_millis(500),
            reason: "connection refused".to_string(),
        });
        let snapshot = status.snapshot();
        assert_eq!(snapshot.state, AdapterState::Backoff);
        assert_eq!(snapshot.reconnect_attempts, 1);
        assert_eq!(snapshot.last_error.as_deref(), Some("connection refused"));

        pipeline.handle(AdapterEvent::State(AdapterState::Streaming));
        let snapshot = status.snapshot();
        assert!(snapshot.connected);
        assert_eq!(snapshot.reconnect_attempts, 1);

        assert_eq!(pipeline.handle(AdapterEvent::Stable), PipelineOutcome::Recovered);
        let snapshot = status.snapshot();
        assert_eq!(snapshot.reconnect_attempts, 0);
        assert!(snapshot.last_error.is_none());
    }
}
