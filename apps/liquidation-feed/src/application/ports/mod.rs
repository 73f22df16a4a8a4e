//! Port Interfaces
//!
//! Contracts between the application services and the outside world.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`AlertSink`]: delivers alerts for unusually large events

use async_trait::async_trait;
use chrono::FixedOffset;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::trade::{DashboardRecord, TradeEvent};

/// Errors raised while delivering an alert.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    /// Request could not be sent or timed out.
    #[error("alert transport failed: {0}")]
    Transport(String),
    /// Receiver answered with a non-success status.
    #[error("alert rejected with status {0}")]
    Rejected(u16),
}

/// Alert payload for a single large event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    /// Human-readable one-line summary.
    pub text: String,
    /// The event in dashboard shape.
    pub record: DashboardRecord,
}

impl Alert {
    /// Build an alert for `event`, rendering times at `display_offset`.
    #[must_use]
    pub fn for_event(event: &TradeEvent, display_offset: FixedOffset) -> Self {
        let record = event.to_record(display_offset);
        let text = format!(
            "\u{1f6a8} Liquidation Alert \u{1f6a8} {} {} {} {} @ {} (${})",
            record.source, record.symbol, record.side, record.quantity, record.price, record.total,
        );
        Self { text, record }
    }

    /// Notional of the alerted event.
    #[must_use]
    pub const fn notional(&self) -> Decimal {
        self.record.total
    }
}

/// Outbound alert delivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one alert.
    async fn send(&self, alert: &Alert) -> Result<(), AlertError>;
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::trade::{Exchange, Side};

    #[test]
    fn alert_text_summarizes_event() {
        let event = TradeEvent::new(
            "BTCUSDT",
            Side::Sell,
            Decimal::from(50_000),
            Decimal::from(3),
            Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            Exchange::Binance,
        )
        .unwrap();

        let alert = Alert::for_event(&event, FixedOffset::east_opt(0).unwrap());
        assert_eq!(alert.notional(), Decimal::from(150_000));
        assert!(alert.text.contains("Binance BTCUSDT Sell 3 @ 50000 ($150000)"));
        assert_eq!(alert.record.trade_time, "2023-11-14 22:13:20");
    }
}
