//! Kraken trade channel payloads.
//!
//! Trades arrive as a positional array:
//!
//! ```json
//! [0, [["5541.20000","0.15850568","1534614057.321597","s","l",""]], "trade", "XBT/USD"]
//! ```
//!
//! Each trade entry is `[price, volume, time, side, order_type, misc]`.
//! Event messages (`{"event": ...}`) are not trades.

use serde_json::Value;

use super::NormalizeError;
use super::fields::{as_str, decimal, element, epoch_seconds};
use crate::domain::trade::{Exchange, Side, TradeEvent};

const CHANNEL_NAME: &str = "trade";

/// Map a Kraken trade channel payload. Only the first trade is translated.
///
/// # Errors
///
/// Returns [`NormalizeError`] for non-trade messages, empty batches, or
/// malformed entries.
pub fn normalize_kraken(payload: &Value) -> Result<TradeEvent, NormalizeError> {
    let frame = payload.as_array().ok_or(NormalizeError::NotATrade)?;
    if frame.len() < 4 || frame[2].as_str() != Some(CHANNEL_NAME) {
        return Err(NormalizeError::NotATrade);
    }

    let trades = frame[1].as_array().ok_or(NormalizeError::InvalidType {
        field: "trades",
        expected: "an array",
    })?;
    let trade = trades.first().ok_or(NormalizeError::EmptyBatch)?;
    let trade = trade.as_array().ok_or(NormalizeError::InvalidType {
        field: "trade",
        expected: "an array",
    })?;

    let symbol = as_str(&frame[3], "pair")?;
    let price = decimal(element(trade, 0, "price")?, "price")?;
    let quantity = decimal(element(trade, 1, "volume")?, "volume")?;
    let occurred_at = epoch_seconds(element(trade, 2, "time")?, "time")?;
    let side = parse_side(as_str(element(trade, 3, "side")?, "side")?);

    Ok(TradeEvent::new(
        symbol,
        side,
        price,
        quantity,
        occurred_at,
        Exchange::Kraken,
    )?)
}

/// `"b"` is a buy; every other code is a sell.
fn parse_side(raw: &str) -> Side {
    if raw == "b" { Side::Buy } else { Side::Sell }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn frame(trades: Value) -> Value {
        json!([0, trades, "trade", "XBT/USD"])
    }

    #[test]
    fn maps_first_trade() {
        let payload = frame(json!([
            ["5541.20000", "0.15850568", "1534614057.321597", "s", "l", ""],
            ["6060.00000", "0.02455000", "1534614057.324998", "b", "l", ""]
        ]));

        let event = normalize_kraken(&payload).unwrap();
        assert_eq!(event.symbol(), "XBT/USD");
        assert_eq!(event.side(), Side::Sell);
        assert_eq!(event.price(), Decimal::new(554_120_000, 5));
        assert_eq!(event.quantity(), Decimal::new(15_850_568, 8));
        assert_eq!(event.notional(), Decimal::new(87_831, 2));
        assert_eq!(event.occurred_at().timestamp(), 1_534_614_057);
        assert_eq!(event.source(), Exchange::Kraken);
    }

    #[test]
    fn buy_code() {
        let payload = frame(json!([["100.0", "2.0", "1534614057.0", "b", "m", ""]]));
        assert_eq!(normalize_kraken(&payload).unwrap().side(), Side::Buy);
    }

    #[test]
    fn event_messages_are_not_trades() {
        assert_eq!(
            normalize_kraken(&json!({"event": "systemStatus", "status": "online"})),
            Err(NormalizeError::NotATrade)
        );
        assert_eq!(
            normalize_kraken(&json!([0, [], "book-10", "XBT/USD"])),
            Err(NormalizeError::NotATrade)
        );
        assert_eq!(
            normalize_kraken(&json!([0, [], "trade"])),
            Err(NormalizeError::NotATrade)
        );
    }

    #[test]
    fn empty_batch() {
        assert_eq!(
            normalize_kraken(&frame(json!([]))),
            Err(NormalizeError::EmptyBatch)
        );
    }

    #[test]
    fn short_trade_entry() {
        assert_eq!(
            normalize_kraken(&frame(json!([["100.0", "2.0"]]))),
            Err(NormalizeError::MissingField("time"))
        );
    }
}
