//! Payload Normalization
//!
//! One pure mapping per exchange from a decoded JSON payload to a canonical
//! [`TradeEvent`]. Mappers never panic: anything unexpected becomes a
//! [`NormalizeError`] that the pipeline counts and discards.
//!
//! # Batch payloads
//!
//! Kraken and OKX deliver trades in lists. Only the first entry of a list is
//! translated; the rest of the batch is dropped. This matches the behavior
//! existing dashboards were built against and is kept on purpose.

mod binance;
mod coinbase;
mod fields;
mod kraken;
mod okx;

use serde_json::Value;

use crate::domain::trade::{Exchange, TradeError, TradeEvent};

pub use binance::normalize_binance;
pub use coinbase::normalize_coinbase;
pub use kraken::normalize_kraken;
pub use okx::normalize_okx;

/// Why a payload did not produce a trade event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizeError {
    /// Payload is valid but is not a trade (acks, heartbeats, status).
    #[error("payload is not a trade message")]
    NotATrade,
    /// Trade list was present but empty.
    #[error("trade batch is empty")]
    EmptyBatch,
    /// A required field is absent.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
    /// A field has the wrong JSON type.
    #[error("field `{field}` should be {expected}")]
    InvalidType {
        /// Field name.
        field: &'static str,
        /// Expected JSON type.
        expected: &'static str,
    },
    /// A numeric field could not be parsed as a decimal.
    #[error("field `{field}` is not a decimal: {value}")]
    InvalidNumber {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    /// A timestamp field is out of range or malformed.
    #[error("field `{field}` is not a valid timestamp: {value}")]
    InvalidTimestamp {
        /// Field name.
        field: &'static str,
        /// Raw value.
        value: String,
    },
    /// Side code is not recognized.
    #[error("unrecognized side `{0}`")]
    InvalidSide(String),
    /// Fields parsed but violate trade invariants.
    #[error(transparent)]
    InvalidTrade(#[from] TradeError),
}

impl NormalizeError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::NotATrade => "not_a_trade",
            Self::EmptyBatch => "empty_batch",
            Self::MissingField(_) => "missing_field",
            Self::InvalidType { .. } => "invalid_type",
            Self::InvalidNumber { .. } => "invalid_number",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::InvalidSide(_) => "invalid_side",
            Self::InvalidTrade(_) => "invalid_trade",
        }
    }
}

/// Map a decoded payload from `exchange` into a trade event.
///
/// # Errors
///
/// Returns [`NormalizeError`] when the payload is not a trade or is malformed.
pub fn normalize(exchange: Exchange, payload: &Value) -> Result<TradeEvent, NormalizeError> {
    match exchange {
        Exchange::Binance => normalize_binance(payload),
        Exchange::Kraken => normalize_kraken(payload),
        Exchange::Coinbase => normalize_coinbase(payload),
        Exchange::Okx => normalize_okx(payload),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(Exchange::Binance, json!({"e": "forceOrder"}) ; "binance without order")]
    #[test_case(Exchange::Kraken, json!({"event": "heartbeat"}) ; "kraken heartbeat")]
    #[test_case(Exchange::Coinbase, json!({"type": "subscriptions"}) ; "coinbase ack")]
    #[test_case(Exchange::Okx, json!({"event": "subscribe"}) ; "okx ack")]
    #[test_case(Exchange::Okx, json!(null) ; "okx null")]
    #[test_case(Exchange::Kraken, json!("text") ; "kraken string")]
    fn control_messages_are_rejected(exchange: Exchange, payload: Value) {
        assert!(normalize(exchange, &payload).is_err());
    }

    const HUGE: &str = "79228162514264337593543950335";

    #[test_case(Exchange::Binance, json!({"o": {"s": "BTCUSDT", "S": "SELL", "p": HUGE, "q": "10", "T": 1_700_000_000_000_i64}}) ; "binance")]
    #[test_case(Exchange::Kraken, json!([0, [[HUGE, "10", "1534614057.1", "s", "l", ""]], "trade", "XBT/USD"]) ; "kraken")]
    #[test_case(Exchange::Coinbase, json!({"type": "match", "side": "buy", "price": HUGE, "size": "10", "product_id": "BTC-USD", "time": "2024-01-01T00:00:00Z"}) ; "coinbase")]
    #[test_case(Exchange::Okx, json!({"data": [{"instId": "BTC-USDT", "px": HUGE, "sz": "10", "side": "sell", "ts": "1700000000000"}]}) ; "okx")]
    fn overflowing_notional_is_rejected(exchange: Exchange, payload: Value) {
        assert!(matches!(
            normalize(exchange, &payload),
            Err(NormalizeError::InvalidTrade(TradeError::NotionalOverflow { .. }))
        ));
    }

    #[test]
    fn dispatch_tags_source() {
        let payload = json!({"type": "match", "side": "sell", "price": "10", "size": "2",
            "product_id": "ETH-USD", "time": "2024-01-01T00:00:00Z"});
        let event = normalize(Exchange::Coinbase, &payload).unwrap();
        assert_eq!(event.source(), Exchange::Coinbase);
    }

    #[test]
    fn reasons_are_stable() {
        assert_eq!(NormalizeError::NotATrade.reason(), "not_a_trade");
        assert_eq!(NormalizeError::MissingField("p").reason(), "missing_field");
        assert_eq!(
            NormalizeError::InvalidTrade(TradeError::EmptySymbol).reason(),
            "invalid_trade"
        );
    }
}
