//! Large-event Alerts
//!
//! A broadcaster consumer that forwards events at or above a notional
//! threshold to an [`AlertSink`]. Delivery failures are logged and counted,
//! never retried.

use std::sync::Arc;

use chrono::FixedOffset;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{Alert, AlertSink};
use crate::domain::trade::TradeEvent;
use crate::infrastructure::broadcast::Consumer;
use crate::infrastructure::metrics;

/// Forwards large events to an alert sink.
pub struct AlertService {
    sink: Arc<dyn AlertSink>,
    min_notional: Decimal,
    display_offset: FixedOffset,
}

impl AlertService {
    /// Create a service alerting on events with notional `>= min_notional`.
    #[must_use]
    pub fn new(sink: Arc<dyn AlertSink>, min_notional: Decimal, display_offset: FixedOffset) -> Self {
        Self {
            sink,
            min_notional,
            display_offset,
        }
    }

    /// Whether `event` is large enough to alert on.
    #[must_use]
    pub fn should_alert(&self, event: &TradeEvent) -> bool {
        event.notional() >= self.min_notional
    }

    /// Deliver an alert for `event` if it qualifies. Returns whether an alert
    /// was delivered.
    pub async fn handle(&self, event: &TradeEvent) -> bool {
        if !self.should_alert(event) {
            return false;
        }

        let alert = Alert::for_event(event, self.display_offset);
        match self.sink.send(&alert).await {
            Ok(()) => {
                metrics::record_alert(true);
                tracing::info!(
                    symbol = event.symbol(),
                    source = %event.source(),
                    notional = %event.notional(),
                    "Alert sent"
                );
                true
            }
            Err(e) => {
                metrics::record_alert(false);
                tracing::warn!(symbol = event.symbol(), error = %e, "Alert delivery failed");
                false
            }
        }
    }

    /// Consume events until cancelled or the broadcaster shuts down.
    pub async fn run(self, mut consumer: Consumer, cancel: CancellationToken) {
        tracing::info!(min_notional = %self.min_notional, "Alert service started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                event = consumer.recv() => match event {
                    Some(event) => {
                        self.handle(&event).await;
                    }
                    None => break,
                },
            }
        }
        tracing::info!(dropped = consumer.dropped(), "Alert service stopped");
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::application::ports::{AlertError, MockAlertSink};
    use crate::domain::trade::{Exchange, Side};
    use crate::infrastructure::broadcast::Broadcaster;

    fn event(quantity: i64) -> TradeEvent {
        TradeEvent::new(
            "BTCUSDT",
            Side::Buy,
            Decimal::from(50_000),
            Decimal::from(quantity),
            Utc::now(),
            Exchange::Binance,
        )
        .unwrap()
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    #[tokio::test]
    async fn large_events_are_sent() {
        let mut sink = MockAlertSink::new();
        sink.expect_send()
            .withf(|alert| alert.notional() == Decimal::from(100_000))
            .times(1)
            .returning(|_| Ok(()));

        let service = AlertService::new(Arc::new(sink), Decimal::from(100_000), utc());
        assert!(service.handle(&event(2)).await);
    }

    #[tokio::test]
    async fn small_events_are_skipped() {
        let mut sink = MockAlertSink::new();
        sink.expect_send().never();

        let service = AlertService::new(Arc::new(sink), Decimal::from(100_000), utc());
        assert!(!service.handle(&event(1)).await);
    }

    #[tokio::test]
    async fn failures_are_not_retried() {
        let mut sink = MockAlertSink::new();
        sink.expect_send()
            .times(1)
            .returning(|_| Err(AlertError::Rejected(500)));

        let service = AlertService::new(Arc::new(sink), Decimal::ZERO, utc());
        assert!(!service.handle(&event(1)).await);
    }

    #[tokio::test]
    async fn run_stops_when_broadcaster_shuts_down() {
        let mut sink = MockAlertSink::new();
        sink.expect_send().times(1).returning(|_| Ok(()));

        let broadcaster = Broadcaster::new(8);
        let consumer = broadcaster.register("alerts").unwrap();
        let service = AlertService::new(Arc::new(sink), Decimal::from(100_000), utc());
        let task = tokio::spawn(service.run(consumer, CancellationToken::new()));

        broadcaster.publish(&event(1));
        broadcaster.publish(&event(3));
        broadcaster.shutdown();

        tokio::time::timeout(std::time::Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(broadcaster.consumer_count(), 0);
    }
}
