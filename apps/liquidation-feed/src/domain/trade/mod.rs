//! Canonical Trade Events
//!
//! Every exchange message that survives normalization becomes a
//! [`TradeEvent`]. The event is a value object: it has no identity, cannot be
//! mutated after construction, and derives its notional from price and
//! quantity instead of trusting an upstream total.
//!
//! [`DashboardRecord`] is the downstream wire shape. Its JSON keys are kept
//! verbatim (`Symbol`, `Side`, `Price`, `Quantity`, `Total($)`, `Trade Time`,
//! `Source`) because existing dashboard clients read them by name.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Decimal places kept for the notional value.
pub const NOTIONAL_SCALE: u32 = 2;

/// Format used for the `Trade Time` field of dashboard records.
pub const TRADE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Side
// =============================================================================

/// Aggressor side of a trade or liquidation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Buy side.
    Buy,
    /// Sell side.
    Sell,
}

impl Side {
    /// Display name used in dashboard records.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Exchange
// =============================================================================

/// Upstream exchange an event originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exchange {
    /// Binance USD-M futures forced-order (liquidation) stream.
    Binance,
    /// Kraken spot public trade channel.
    Kraken,
    /// Coinbase matches channel.
    Coinbase,
    /// OKX public trades channel.
    #[serde(rename = "OKX")]
    Okx,
}

impl Exchange {
    /// All supported exchanges.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Binance, Self::Kraken, Self::Coinbase, Self::Okx]
    }

    /// Display name used in dashboard records and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "Binance",
            Self::Kraken => "Kraken",
            Self::Coinbase => "Coinbase",
            Self::Okx => "OKX",
        }
    }

    /// Lowercase label used for metrics and configuration.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::Kraken => "kraken",
            Self::Coinbase => "coinbase",
            Self::Okx => "okx",
        }
    }

    /// Parse an exchange from its configuration label, ignoring case.
    #[must_use]
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Some(Self::Binance),
            "kraken" => Some(Self::Kraken),
            "coinbase" => Some(Self::Coinbase),
            "okx" => Some(Self::Okx),
            _ => None,
        }
    }
}

impl fmt::Display for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Trade Event
// =============================================================================

/// Errors raised when a trade event would violate its invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    /// Symbol was empty or whitespace.
    #[error("symbol must not be empty")]
    EmptySymbol,
    /// Price was zero or negative.
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),
    /// Quantity was zero or negative.
    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),
    /// `price * quantity` does not fit in a decimal.
    #[error("notional of {price} x {quantity} overflows")]
    NotionalOverflow {
        /// Execution price.
        price: Decimal,
        /// Executed quantity.
        quantity: Decimal,
    },
}

/// Canonical trade or liquidation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeEvent {
    symbol: String,
    side: Side,
    price: Decimal,
    quantity: Decimal,
    notional: Decimal,
    occurred_at: DateTime<Utc>,
    source: Exchange,
}

impl TradeEvent {
    /// Build a validated event. The notional is always recomputed here.
    ///
    /// # Errors
    ///
    /// Returns [`TradeError`] for an empty symbol, a non-positive price or
    /// quantity, or a notional too large to represent.
    pub fn new(
        symbol: impl Into<String>,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
        source: Exchange,
    ) -> Result<Self, TradeError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(TradeError::EmptySymbol);
        }
        if price <= Decimal::ZERO {
            return Err(TradeError::NonPositivePrice(price));
        }
        if quantity <= Decimal::ZERO {
            return Err(TradeError::NonPositiveQuantity(quantity));
        }

        let notional =
            notional(price, quantity).ok_or(TradeError::NotionalOverflow { price, quantity })?;

        Ok(Self {
            notional,
            symbol,
            side,
            price,
            quantity,
            occurred_at,
            source,
        })
    }

    /// Instrument identifier as the exchange names it.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Trade side.
    #[must_use]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Execution price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Executed quantity.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// `price * quantity` rounded to two decimal places.
    #[must_use]
    pub const fn notional(&self) -> Decimal {
        self.notional
    }

    /// Execution time as an absolute instant.
    #[must_use]
    pub const fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// Originating exchange.
    #[must_use]
    pub const fn source(&self) -> Exchange {
        self.source
    }

    /// Render the event in the dashboard wire shape.
    #[must_use]
    pub fn to_record(&self, display_offset: FixedOffset) -> DashboardRecord {
        DashboardRecord {
            symbol: self.symbol.clone(),
            side: self.side,
            price: self.price,
            quantity: self.quantity,
            total: self.notional,
            trade_time: self
                .occurred_at
                .with_timezone(&display_offset)
                .format(TRADE_TIME_FORMAT)
                .to_string(),
            source: self.source,
        }
    }
}

/// Compute the notional value of a trade, rounded half-to-even to cents.
/// `None` when the product overflows.
#[must_use]
pub fn notional(price: Decimal, quantity: Decimal) -> Option<Decimal> {
    price
        .checked_mul(quantity)
        .map(|total| total.round_dp(NOTIONAL_SCALE))
}

// =============================================================================
// Dashboard Record
// =============================================================================

/// Downstream record sent to dashboard consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardRecord {
    /// Instrument identifier.
    #[serde(rename = "Symbol")]
    pub symbol: String,
    /// Trade side.
    #[serde(rename = "Side")]
    pub side: Side,
    /// Execution price.
    #[serde(rename = "Price", with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Executed quantity.
    #[serde(rename = "Quantity", with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    /// Notional in quote currency.
    #[serde(rename = "Total($)", with = "rust_decimal::serde::float")]
    pub total: Decimal,
    /// Local trade time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "Trade Time")]
    pub trade_time: String,
    /// Originating exchange.
    #[serde(rename = "Source")]
    pub source: Exchange,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn seoul() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    #[test]
    fn notional_is_rounded_to_cents() {
        assert_eq!(notional(dec("50000.00"), dec("0.01")), Some(dec("500.00")));
        assert_eq!(notional(dec("100.23"), dec("0.005")), Some(dec("0.50")));
        assert_eq!(notional(dec("1.005"), dec("1")), Some(dec("1.00")));
    }

    #[test]
    fn oversized_notional_is_rejected() {
        let price = Decimal::MAX;
        let quantity = dec("10");
        assert_eq!(notional(price, quantity), None);
        assert_eq!(
            TradeEvent::new("BTCUSDT", Side::Sell, price, quantity, Utc::now(), Exchange::Binance),
            Err(TradeError::NotionalOverflow { price, quantity })
        );
    }

    #[test]
    fn new_rejects_invalid_fields() {
        let now = Utc::now();
        assert_eq!(
            TradeEvent::new(" ", Side::Buy, dec("1"), dec("1"), now, Exchange::Kraken),
            Err(TradeError::EmptySymbol)
        );
        assert_eq!(
            TradeEvent::new("BTC", Side::Buy, dec("0"), dec("1"), now, Exchange::Kraken),
            Err(TradeError::NonPositivePrice(dec("0")))
        );
        assert_eq!(
            TradeEvent::new("BTC", Side::Buy, dec("1"), dec("-2"), now, Exchange::Kraken),
            Err(TradeError::NonPositiveQuantity(dec("-2")))
        );
    }

    #[test]
    fn record_uses_verbatim_keys_and_local_time() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let event = TradeEvent::new(
            "BTCUSDT",
            Side::Sell,
            dec("50000.00"),
            dec("0.01"),
            at,
            Exchange::Binance,
        )
        .unwrap();

        let json = serde_json::to_value(event.to_record(seoul())).unwrap();
        assert_eq!(json["Symbol"], "BTCUSDT");
        assert_eq!(json["Side"], "Sell");
        assert_eq!(json["Price"], 50000.0);
        assert_eq!(json["Quantity"], 0.01);
        assert_eq!(json["Total($)"], 500.0);
        assert_eq!(json["Trade Time"], "2023-11-15 07:13:20");
        assert_eq!(json["Source"], "Binance");
    }

    #[test]
    fn okx_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&Exchange::Okx).unwrap(), "\"OKX\"");
    }

    #[test]
    fn exchange_labels_round_trip() {
        for exchange in Exchange::all() {
            assert_eq!(Exchange::from_label(exchange.label()), Some(*exchange));
        }
        assert_eq!(Exchange::from_label(" OKX "), Some(Exchange::Okx));
        assert_eq!(Exchange::from_label("bitmex"), None);
    }

    proptest! {
        #[test]
        fn notional_matches_rounded_product(
            price_cents in 1i64..10_000_000_000,
            qty_units in 1i64..1_000_000_000,
        ) {
            let price = Decimal::new(price_cents, 2);
            let quantity = Decimal::new(qty_units, 6);
            let event = TradeEvent::new(
                "X", Side::Buy, price, quantity, Utc::now(), Exchange::Okx,
            ).unwrap();
            prop_assert_eq!(event.notional(), (price * quantity).round_dp(2));
            prop_assert!(event.notional().scale() <= 2);
        }
    }
}
