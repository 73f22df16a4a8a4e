//! Binance forced-order (liquidation) payloads.
//!
//! ```json
//! {"e":"forceOrder","E":1700000000100,
//!  "o":{"s":"BTCUSDT","S":"SELL","p":"50000.00","q":"0.01","T":1700000000000}}
//! ```

use serde_json::Value;

use super::NormalizeError;
use super::fields::{decimal_field, epoch_millis, field, str_field};
use crate::domain::trade::{Exchange, Side, TradeEvent};

/// Map a Binance `forceOrder` payload.
///
/// # Errors
///
/// Returns [`NormalizeError`] when the order object or any field is missing
/// or malformed.
pub fn normalize_binance(payload: &Value) -> Result<TradeEvent, NormalizeError> {
    let order = payload.get("o").ok_or(NormalizeError::NotATrade)?;
    if !order.is_object() {
        return Err(NormalizeError::InvalidType {
            field: "o",
            expected: "an object",
        });
    }

    let symbol = str_field(order, "s")?;
    let side = parse_side(str_field(order, "S")?)?;
    let price = decimal_field(order, "p")?;
    let quantity = decimal_field(order, "q")?;
    let occurred_at = epoch_millis(field(order, "T")?, "T")?;

    Ok(TradeEvent::new(
        symbol,
        side,
        price,
        quantity,
        occurred_at,
        Exchange::Binance,
    )?)
}

fn parse_side(raw: &str) -> Result<Side, NormalizeError> {
    if raw.eq_ignore_ascii_case("buy") {
        Ok(Side::Buy)
    } else if raw.eq_ignore_ascii_case("sell") {
        Ok(Side::Sell)
    } else {
        Err(NormalizeError::InvalidSide(raw.to_string()))
    }
}
