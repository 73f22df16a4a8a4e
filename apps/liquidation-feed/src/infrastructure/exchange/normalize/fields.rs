//! Field extraction helpers shared by the exchange mappers.

use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;

use super::NormalizeError;
use crate::domain::trade::Side;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub(super) fn field<'a>(value: &'a Value, name: &'static str) -> Result<&'a Value, NormalizeError> {
    value.get(name).ok_or(NormalizeError::MissingField(name))
}

pub(super) fn element<'a>(
    values: &'a [Value],
    index: usize,
    name: &'static str,
) -> Result<&'a Value, NormalizeError> {
    values.get(index).ok_or(NormalizeError::MissingField(name))
}

pub(super) fn as_str<'a>(value: &'a Value, name: &'static str) -> Result<&'a str, NormalizeError> {
    value.as_str().ok_or(NormalizeError::InvalidType {
        field: name,
        expected: "a string",
    })
}

pub(super) fn str_field<'a>(value: &'a Value, name: &'static str) -> Result<&'a str, NormalizeError> {
    as_str(field(value, name)?, name)
}

/// Decimal from a JSON string or number, without going through `f64`.
pub(super) fn decimal(value: &Value, name: &'static str) -> Result<Decimal, NormalizeError> {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => {
            return Err(NormalizeError::InvalidType {
                field: name,
                expected: "a number or numeric string",
            });
        }
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map_err(|_| NormalizeError::InvalidNumber {
            field: name,
            value: raw,
        })
}

pub(super) fn decimal_field(value: &Value, name: &'static str) -> Result<Decimal, NormalizeError> {
    decimal(field(value, name)?, name)
}

/// Epoch milliseconds from a JSON integer or integer string.
pub(super) fn epoch_millis(value: &Value, name: &'static str) -> Result<DateTime<Utc>, NormalizeError> {
    let millis = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => {
            return Err(NormalizeError::InvalidType {
                field: name,
                expected: "an integer or integer string",
            });
        }
    };

    millis
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .ok_or_else(|| NormalizeError::InvalidTimestamp {
            field: name,
            value: value.to_string(),
        })
}

/// Epoch seconds with a fractional part, e.g. `"1534614057.321597"`.
pub(super) fn epoch_seconds(value: &Value, name: &'static str) -> Result<DateTime<Utc>, NormalizeError> {
    let seconds = decimal(value, name)?;
    let invalid = || NormalizeError::InvalidTimestamp {
        field: name,
        value: value.to_string(),
    };

    let whole = seconds.trunc();
    let secs = whole.to_i64().ok_or_else(invalid)?;
    let nanos = ((seconds - whole) * Decimal::from(NANOS_PER_SECOND))
        .round()
        .to_u32()
        .ok_or_else(invalid)?;

    DateTime::from_timestamp(secs, nanos).ok_or_else(invalid)
}

/// RFC 3339 timestamp string.
pub(super) fn rfc3339(value: &Value, name: &'static str) -> Result<DateTime<Utc>, NormalizeError> {
    let raw = as_str(value, name)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| NormalizeError::InvalidTimestamp {
            field: name,
            value: raw.to_string(),
        })
}

/// `"buy"` is a buy; every other value is a sell.
pub(super) fn side_from_word(raw: &str) -> Side {
    if raw == "buy" { Side::Buy } else { Side::Sell }
}
