//! OKX `trades` channel payloads.
//!
//! ```json
//! {"arg":{"channel":"trades","instId":"BTC-USDT"},
//!  "data":[{"instId":"BTC-USDT","tradeId":"1","px":"42000.1","sz":"0.5","side":"sell","ts":"1700000000000"}]}
//! ```

use serde_json::Value;

use super::NormalizeError;
use super::fields::{decimal_field, epoch_millis, field, side_from_word, str_field};
use crate::domain::trade::{Exchange, TradeEvent};

/// Map an OKX trades payload. Only the first entry of `data` is translated.
///
/// # Errors
///
/// Returns [`NormalizeError`] for acks, empty batches, or malformed entries.
pub fn normalize_okx(payload: &Value) -> Result<TradeEvent, NormalizeError> {
    let batch = payload
        .get("data")
        .and_then(Value::as_array)
        .ok_or(NormalizeError::NotATrade)?;
    let trade = batch.first().ok_or(NormalizeError::EmptyBatch)?;

    let symbol = str_field(trade, "instId")?;
    let side = side_from_word(str_field(trade, "side")?);
    let price = decimal_field(trade, "px")?;
    let quantity = decimal_field(trade, "sz")?;
    let occurred_at = epoch_millis(field(trade, "ts")?, "ts")?;

    Ok(TradeEvent::new(
        symbol,
        side,
        price,
        quantity,
        occurred_at,
        Exchange::Okx,
    )?)
}
