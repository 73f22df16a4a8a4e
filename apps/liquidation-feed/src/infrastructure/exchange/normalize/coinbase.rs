//! Coinbase `matches` channel payloads.
//!
//! ```json
//! {"type":"match","trade_id":10,"side":"buy","size":"0.005","price":"100.23",
//!  "product_id":"BTC-USD","time":"2020-07-06T20:58:53.554555Z"}
//! ```

use serde_json::Value;

use super::NormalizeError;
use super::fields::{decimal_field, field, rfc3339, side_from_word, str_field};
use crate::domain::trade::{Exchange, TradeEvent};

const MATCH_TYPE: &str = "match";

/// Map a Coinbase `match` payload.
///
/// # Errors
///
/// Returns [`NormalizeError`] for non-match messages or malformed fields.
pub fn normalize_coinbase(payload: &Value) -> Result<TradeEvent, NormalizeError> {
    if payload.get("type").and_then(Value::as_str) != Some(MATCH_TYPE) {
        return Err(NormalizeError::NotATrade);
    }

    let symbol = str_field(payload, "product_id")?;
    let side = side_from_word(str_field(payload, "side")?);
    let price = decimal_field(payload, "price")?;
    let quantity = decimal_field(payload, "size")?;
    let occurred_at = rfc3339(field(payload, "time")?, "time")?;

    Ok(TradeEvent::new(
        symbol,
        side,
        price,
        quantity,
        occurred_at,
        Exchange::Coinbase,
    )?)
}
