//! Exchange Endpoints and Subscribe Handshakes
//!
//! Each exchange dictates its own URL and subscribe message. The message
//! shapes below are the exchanges' wire formats and must not be reshaped.
//!
//! | Exchange | Handshake |
//! |----------|-----------|
//! | Binance  | none (stream selected by URL) |
//! | Kraken   | `{"event":"subscribe","pair":[..],"subscription":{"name":"trade"}}` |
//! | Coinbase | `{"type":"subscribe","channels":[{"name":"matches","product_ids":[..]}]}` |
//! | OKX      | `{"op":"subscribe","args":[{"channel":"trades","instId":".."}]}` |

use serde::Serialize;

use crate::domain::trade::Exchange;

/// Binance USD-M futures all-market liquidation stream.
pub const BINANCE_URL: &str = "wss://fstream.binance.com/ws/!forceOrder@arr";
/// Kraken public WebSocket API (v1).
pub const KRAKEN_URL: &str = "wss://ws.kraken.com";
/// Coinbase public feed.
pub const COINBASE_URL: &str = "wss://ws-feed.pro.coinbase.com";
/// OKX public WebSocket API (v5).
pub const OKX_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

// =============================================================================
// Handshake Messages
// =============================================================================

#[derive(Debug, Serialize)]
struct KrakenSubscribe<'a> {
    event: &'static str,
    pair: &'a [String],
    subscription: KrakenSubscription,
}

#[derive(Debug, Serialize)]
struct KrakenSubscription {
    name: &'static str,
}

#[derive(Debug, Serialize)]
struct CoinbaseSubscribe<'a> {
    #[serde(rename = "type")]
    msg_type: &'static str,
    channels: [CoinbaseChannel<'a>; 1],
}

#[derive(Debug, Serialize)]
struct CoinbaseChannel<'a> {
    name: &'static str,
    product_ids: &'a [String],
}

#[derive(Debug, Serialize)]
struct OkxSubscribe<'a> {
    op: &'static str,
    args: Vec<OkxArg<'a>>,
}

#[derive(Debug, Serialize)]
struct OkxArg<'a> {
    channel: &'static str,
    #[serde(rename = "instId")]
    inst_id: &'a str,
}

// =============================================================================
// Exchange Config
// =============================================================================

/// Everything an adapter needs to reach one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    /// Which exchange this is.
    pub exchange: Exchange,
    /// WebSocket URL.
    pub url: String,
    /// Instruments named in the subscribe handshake. Unused for Binance.
    pub instruments: Vec<String>,
}

impl ExchangeConfig {
    /// Production endpoint for `exchange` with its default instruments.
    #[must_use]
    pub fn production(exchange: Exchange) -> Self {
        Self {
            exchange,
            url: default_url(exchange).to_string(),
            instruments: default_instruments(exchange),
        }
    }

    /// Override the URL, e.g. to point at a local test server.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Override the instruments named in the handshake.
    #[must_use]
    pub fn with_instruments(mut self, instruments: Vec<String>) -> Self {
        self.instruments = instruments;
        self
    }

    /// Whether the exchange expects a subscribe message after connecting.
    #[must_use]
    pub const fn requires_handshake(&self) -> bool {
        !matches!(self.exchange, Exchange::Binance)
    }

    /// Serialized subscribe message, or `None` when no handshake is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn subscribe_message(&self) -> Result<Option<String>, serde_json::Error> {
        let message = match self.exchange {
            Exchange::Binance => return Ok(None),
            Exchange::Kraken => serde_json::to_string(&KrakenSubscribe {
                event: "subscribe",
                pair: &self.instruments,
                subscription: KrakenSubscription { name: "trade" },
            })?,
            Exchange::Coinbase => serde_json::to_string(&CoinbaseSubscribe {
                msg_type: "subscribe",
                channels: [CoinbaseChannel {
                    name: "matches",
                    product_ids: &self.instruments,
                }],
            })?,
            Exchange::Okx => serde_json::to_string(&OkxSubscribe {
                op: "subscribe",
                args: self
                    .instruments
                    .iter()
                    .map(|inst_id| OkxArg {
                        channel: "trades",
                        inst_id: inst_id.as_str(),
                    })
                    .collect(),
            })?,
        };
        Ok(Some(message))
    }
}

/// Production URL for an exchange.
#[must_use]
pub const fn default_url(exchange: Exchange) -> &'static str {
    match exchange {
        Exchange::Binance => BINANCE_URL,
        Exchange::Kraken => KRAKEN_URL,
        Exchange::Coinbase => COINBASE_URL,
        Exchange::Okx => OKX_URL,
    }
}

/// Instruments subscribed when none are configured.
#[must_use]
pub fn default_instruments(exchange: Exchange) -> Vec<String> {
    match exchange {
        Exchange::Binance => vec![],
        Exchange::Kraken => vec!["XBT/USD".to_string()],
        Exchange::Coinbase => vec!["BTC-USD".to_string()],
        Exchange::Okx => vec!["BTC-USDT".to_string()],
    }
}
