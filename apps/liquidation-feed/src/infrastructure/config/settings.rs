//! Feed Configuration Settings
//!
//! Configuration types for the liquidation feed, loaded from environment
//! variables. Parsing goes through a lookup function so tests can supply
//! variables without touching the process environment.

use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use rust_decimal::Decimal;

use crate::domain::filter::FilterConfig;
use crate::domain::trade::Exchange;
use crate::infrastructure::exchange::venue::{ExchangeConfig, default_instruments};

/// Default notional floor for the filter.
pub const DEFAULT_MIN_NOTIONAL: Decimal = Decimal::from_parts(500, 0, 0, false, 0);

/// Default notional that triggers an alert.
pub const DEFAULT_ALERT_MIN_NOTIONAL: Decimal = Decimal::from_parts(100_000, 0, 0, false, 0);

/// Largest accepted `FEED_BROADCAST_CAPACITY`.
pub const MAX_BROADCAST_CAPACITY: usize = 65_536;

/// Default display offset for `Trade Time` (Asia/Seoul).
pub const DEFAULT_DISPLAY_OFFSET_SECS: i32 = 9 * 3600;

/// WebSocket connection settings.
#[derive(Debug, Clone)]
pub struct WebSocketSettings {
    /// Heartbeat ping interval.
    pub heartbeat_interval: Duration,
    /// Silence tolerated before the connection is considered dead.
    pub heartbeat_timeout: Duration,
    /// Limit on TCP, TLS and WebSocket handshakes together.
    pub connect_timeout: Duration,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Streaming time after which the backoff starts over.
    pub reconnect_stable_after: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(20),
            heartbeat_timeout: Duration::from_secs(40),
            connect_timeout: Duration::from_secs(10),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            reconnect_stable_after: Duration::from_secs(10),
        }
    }
}

/// Fan-out settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Events buffered per consumer before the oldest are dropped.
    pub capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Port for status, health, metrics and the dashboard WebSocket.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

/// Alert webhook settings. Only present when a webhook URL is configured.
#[derive(Clone)]
pub struct AlertSettings {
    /// Webhook endpoint.
    pub webhook_url: String,
    /// Smallest notional that triggers an alert (inclusive).
    pub min_notional: Decimal,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for AlertSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertSettings")
            .field("webhook_url", &"[REDACTED]")
            .field("min_notional", &self.min_notional)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Complete feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Exchanges to connect to, with their endpoints and instruments.
    pub exchanges: Vec<ExchangeConfig>,
    /// Initial filter configuration.
    pub filter: FilterConfig,
    /// Offset used to render `Trade Time`.
    pub display_offset: FixedOffset,
    /// HTTP server settings.
    pub server: ServerSettings,
    /// WebSocket connection settings.
    pub websocket: WebSocketSettings,
    /// Fan-out settings.
    pub broadcast: BroadcastSettings,
    /// How long to wait for adapters to stop on shutdown.
    pub shutdown_timeout: Duration,
    /// Alert webhook, if enabled.
    pub alerts: Option<AlertSettings>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            exchanges: Exchange::all()
                .iter()
                .map(|exchange| ExchangeConfig::production(*exchange))
                .collect(),
            filter: FilterConfig::allow_all().with_minimum_notional(DEFAULT_MIN_NOTIONAL),
            display_offset: default_display_offset(),
            server: ServerSettings::default(),
            websocket: WebSocketSettings::default(),
            broadcast: BroadcastSettings::default(),
            shutdown_timeout: Duration::from_secs(10),
            alerts: None,
        }
    }
}

impl FeedConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(&lookup);
        let defaults = Self::default();

        let exchanges = parse_exchanges(&env)?;

        let filter = FilterConfig {
            allowed_symbols: env.list("FEED_ALLOWED_SYMBOLS").into_iter().collect(),
            minimum_notional: env.optional_decimal("FEED_MIN_NOTIONAL", DEFAULT_MIN_NOTIONAL)?,
        };

        let display_offset = match env.get("FEED_DISPLAY_UTC_OFFSET") {
            Some(raw) => FixedOffset::from_str(&raw).map_err(|_| ConfigError::InvalidValue {
                key: "FEED_DISPLAY_UTC_OFFSET".to_string(),
                value: raw,
            })?,
            None => defaults.display_offset,
        };

        let server = ServerSettings {
            port: env.parse("PORT", defaults.server.port, |_| true)?,
        };

        let websocket = WebSocketSettings {
            heartbeat_interval: env.duration_secs(
                "FEED_HEARTBEAT_INTERVAL_SECS",
                defaults.websocket.heartbeat_interval,
            )?,
            heartbeat_timeout: env.duration_secs(
                "FEED_HEARTBEAT_TIMEOUT_SECS",
                defaults.websocket.heartbeat_timeout,
            )?,
            connect_timeout: env
                .duration_secs("FEED_CONNECT_TIMEOUT_SECS", defaults.websocket.connect_timeout)?,
            reconnect_delay_initial: env.duration_millis(
                "FEED_RECONNECT_DELAY_INITIAL_MS",
                defaults.websocket.reconnect_delay_initial,
            )?,
            reconnect_delay_max: env.duration_secs(
                "FEED_RECONNECT_DELAY_MAX_SECS",
                defaults.websocket.reconnect_delay_max,
            )?,
            reconnect_delay_multiplier: env.parse(
                "FEED_RECONNECT_DELAY_MULTIPLIER",
                defaults.websocket.reconnect_delay_multiplier,
                |m: &f64| m.is_finite() && *m >= 1.0,
            )?,
            reconnect_stable_after: env.duration_secs(
                "FEED_RECONNECT_STABLE_SECS",
                defaults.websocket.reconnect_stable_after,
            )?,
        };

        let broadcast = BroadcastSettings {
            capacity: env.parse(
                "FEED_BROADCAST_CAPACITY",
                defaults.broadcast.capacity,
                |c: &usize| (1..=MAX_BROADCAST_CAPACITY).contains(c),
            )?,
        };

        let alerts = match env.get("ALERT_WEBHOOK_URL") {
            Some(webhook_url) => Some(AlertSettings {
                webhook_url,
                min_notional: env
                    .optional_decimal("ALERT_MIN_NOTIONAL", DEFAULT_ALERT_MIN_NOTIONAL)?
                    .unwrap_or(Decimal::ZERO),
                timeout: env.duration_secs("ALERT_TIMEOUT_SECS", Duration::from_secs(5))?,
            }),
            None => None,
        };

        Ok(Self {
            exchanges,
            filter,
            display_offset,
            server,
            websocket,
            broadcast,
            shutdown_timeout: env
                .duration_secs("FEED_SHUTDOWN_TIMEOUT_SECS", defaults.shutdown_timeout)?,
            alerts,
        })
    }

    /// Exchanges in start order.
    #[must_use]
    pub fn exchange_names(&self) -> Vec<&'static str> {
        self.exchanges.iter().map(|c| c.exchange.as_str()).collect()
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Exchange name is not supported.
    #[error("unknown exchange `{0}` (expected binance, kraken, coinbase or okx)")]
    UnknownExchange(String),
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
    },
}

/// Default `Trade Time` offset.
#[must_use]
pub fn default_display_offset() -> FixedOffset {
    FixedOffset::east_opt(DEFAULT_DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

// =============================================================================
// Parsing Helpers
// =============================================================================

fn parse_exchanges(env: &Env<'_>) -> Result<Vec<ExchangeConfig>, ConfigError> {
    let names = match env.get("FEED_EXCHANGES") {
        Some(raw) => {
            let names = split_list(&raw);
            if names.is_empty() {
                return Err(ConfigError::EmptyValue("FEED_EXCHANGES".to_string()));
            }
            names
        }
        None => Exchange::all().iter().map(|e| e.label().to_string()).collect(),
    };

    let mut exchanges: Vec<ExchangeConfig> = Vec::with_capacity(names.len());
    for name in names {
        let exchange = Exchange::from_label(&name).ok_or(ConfigError::UnknownExchange(name))?;
        if exchanges.iter().any(|c| c.exchange == exchange) {
            continue;
        }

        let mut config = ExchangeConfig::production(exchange);
        if let Some(url) = env.get(&format!("FEED_{}_URL", exchange.label().to_uppercase())) {
            config = config.with_url(url);
        }
        if let Some(key) = instruments_key(exchange) {
            let instruments = env.list(key);
            config = config.with_instruments(if instruments.is_empty() {
                default_instruments(exchange)
            } else {
                instruments
            });
        }
        exchanges.push(config);
    }

    Ok(exchanges)
}

const fn instruments_key(exchange: Exchange) -> Option<&'static str> {
    match exchange {
        Exchange::Binance => None,
        Exchange::Kraken => Some("KRAKEN_PAIRS"),
        Exchange::Coinbase => Some("COINBASE_PRODUCTS"),
        Exchange::Okx => Some("OKX_INST_IDS"),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn list(&self, key: &str) -> Vec<String> {
        self.get(key).map(|raw| split_list(&raw)).unwrap_or_default()
    }

    /// Unset uses `default`. A value that does not parse or fails `valid`
    /// is an error.
    fn parse<T: FromStr>(
        &self,
        key: &str,
        default: T,
        valid: impl Fn(&T) -> bool,
    ) -> Result<T, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(value) if valid(&value) => Ok(value),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        }
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.parse(key, default.as_secs(), |&secs| secs > 0)
            .map(Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let millis = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
        self.parse(key, millis, |&millis| millis > 0)
            .map(Duration::from_millis)
    }

    /// Unset uses `default`; empty or `none` disables; anything else must be
    /// a decimal.
    fn optional_decimal(&self, key: &str, default: Decimal) -> Result<Option<Decimal>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(Some(default));
        };
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(None);
        }
        Decimal::from_str(trimmed)
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<FeedConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        FeedConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_variables() {
        let config = config(&[]).unwrap();
        assert_eq!(config.exchange_names(), ["Binance", "Kraken", "Coinbase", "OKX"]);
        assert_eq!(config.filter.minimum_notional, Some(Decimal::from(500)));
        assert!(config.filter.allowed_symbols.is_empty());
        assert_eq!(config.display_offset.local_minus_utc(), 9 * 3600);
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.broadcast.capacity, 1024);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
        assert!(config.alerts.is_none());
    }

    #[test]
    fn exchange_selection_and_instruments() {
        let config = config(&[
            ("FEED_EXCHANGES", "okx, kraken,okx"),
            ("OKX_INST_IDS", "BTC-USDT,ETH-USDT"),
            ("FEED_KRAKEN_URL", "ws://127.0.0.1:9001"),
        ])
        .unwrap();

        assert_eq!(config.exchange_names(), ["OKX", "Kraken"]);
        assert_eq!(config.exchanges[0].instruments, ["BTC-USDT", "ETH-USDT"]);
        assert_eq!(config.exchanges[1].instruments, ["XBT/USD"]);
        assert_eq!(config.exchanges[1].url, "ws://127.0.0.1:9001");
    }

    #[test]
    fn unknown_exchange_is_an_error() {
        assert!(matches!(
            config(&[("FEED_EXCHANGES", "binance,bitmex")]),
            Err(ConfigError::UnknownExchange(name)) if name == "bitmex"
        ));
        assert!(matches!(
            config(&[("FEED_EXCHANGES", " , ")]),
            Err(ConfigError::EmptyValue(_))
        ));
    }

    #[test]
    fn filter_variables() {
        let config = config(&[
            ("FEED_ALLOWED_SYMBOLS", "BTCUSDT, ETHUSDT"),
            ("FEED_MIN_NOTIONAL", "750.5"),
        ])
        .unwrap();
        assert_eq!(config.filter.allowed_symbols.len(), 2);
        assert!(config.filter.allowed_symbols.contains("ETHUSDT"));
        assert_eq!(config.filter.minimum_notional, Some(Decimal::new(7505, 1)));
    }

    #[test]
    fn minimum_notional_can_be_disabled() {
        let config = config(&[("FEED_MIN_NOTIONAL", "none")]).unwrap();
        assert_eq!(config.filter.minimum_notional, None);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(
            config(&[("FEED_MIN_NOTIONAL", "lots")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("FEED_DISPLAY_UTC_OFFSET", "Seoul")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test_case("PORT", "80a0" ; "port with a typo")]
    #[test_case("PORT", "70000" ; "port out of range")]
    #[test_case("FEED_BROADCAST_CAPACITY", "lots" ; "capacity not a number")]
    #[test_case("FEED_BROADCAST_CAPACITY", "0" ; "capacity zero")]
    #[test_case("FEED_BROADCAST_CAPACITY", "1000000" ; "capacity above cap")]
    #[test_case("FEED_RECONNECT_DELAY_MULTIPLIER", "fast" ; "multiplier not a number")]
    #[test_case("FEED_RECONNECT_DELAY_MULTIPLIER", "0.5" ; "multiplier shrinks")]
    #[test_case("FEED_RECONNECT_DELAY_MULTIPLIER", "NaN" ; "multiplier nan")]
    #[test_case("FEED_HEARTBEAT_TIMEOUT_SECS", "0" ; "zero duration")]
    #[test_case("FEED_CONNECT_TIMEOUT_SECS", "ten" ; "duration not a number")]
    #[test_case("FEED_RECONNECT_DELAY_INITIAL_MS", "-5" ; "negative millis")]
    fn malformed_numbers_are_rejected(key: &str, value: &str) {
        match config(&[(key, value)]) {
            Err(ConfigError::InvalidValue { key: bad, value: raw }) => {
                assert_eq!(bad, key);
                assert_eq!(raw, value);
            }
            other => panic!("expected InvalidValue for {key}={value}, got {other:?}"),
        }
    }

    #[test]
    fn capacity_limit_is_inclusive() {
        let limit = MAX_BROADCAST_CAPACITY.to_string();
        let config = config(&[("FEED_BROADCAST_CAPACITY", limit.as_str())]).unwrap();
        assert_eq!(config.broadcast.capacity, MAX_BROADCAST_CAPACITY);
    }

    #[test]
    fn display_offset_override() {
        let config = config(&[("FEED_DISPLAY_UTC_OFFSET", "-05:00")]).unwrap();
        assert_eq!(config.display_offset.local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn websocket_and_broadcast_overrides() {
        let config = config(&[
            ("FEED_HEARTBEAT_INTERVAL_SECS", "5"),
            ("FEED_RECONNECT_DELAY_INITIAL_MS", "100"),
            ("FEED_RECONNECT_DELAY_MULTIPLIER", "1.5"),
            ("FEED_BROADCAST_CAPACITY", "64"),
            ("FEED_CONNECT_TIMEOUT_SECS", "3"),
            ("FEED_RECONNECT_STABLE_SECS", "30"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.websocket.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.websocket.reconnect_stable_after, Duration::from_secs(30));
        assert_eq!(config.websocket.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.websocket.heartbeat_timeout, Duration::from_secs(40));
        assert_eq!(config.websocket.reconnect_delay_initial, Duration::from_millis(100));
        assert!((config.websocket.reconnect_delay_multiplier - 1.5).abs() < f64::EPSILON);
        assert_eq!(config.broadcast.capacity, 64);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn alerts_enabled_by_webhook_url() {
        let config = config(&[
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/secret-token"),
            ("ALERT_MIN_NOTIONAL", "250000"),
        ])
        .unwrap();
        let alerts = config.alerts.unwrap();
        assert_eq!(alerts.min_notional, Decimal::from(250_000));

        let debug = format!("{alerts:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("[REDACTED]"));
    }
}
