//! Event Filtering
//!
//! [`FilterConfig`] decides whether a normalized event is worth
//! broadcasting. Evaluation is pure; the configuration itself lives behind a
//! [`FilterHandle`] so it can be swapped at runtime while adapters keep
//! reading consistent snapshots without taking a lock.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::trade::TradeEvent;

/// Symbol allow-list plus a minimum notional floor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Symbols to pass through. Empty means every symbol.
    #[serde(default)]
    pub allowed_symbols: HashSet<String>,
    /// Smallest notional to pass through (inclusive). `None` disables it.
    #[serde(default)]
    pub minimum_notional: Option<Decimal>,
}

impl FilterConfig {
    /// Filter that accepts every event.
    #[must_use]
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Builder-style setter for the symbol allow-list.
    #[must_use]
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_symbols = symbols.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style setter for the notional floor.
    #[must_use]
    pub const fn with_minimum_notional(mut self, minimum: Decimal) -> Self {
        self.minimum_notional = Some(minimum);
        self
    }

    /// Whether `event` passes both the symbol and notional checks.
    #[must_use]
    pub fn accept(&self, event: &TradeEvent) -> bool {
        let symbol_ok =
            self.allowed_symbols.is_empty() || self.allowed_symbols.contains(event.symbol());
        let notional_ok = self
            .minimum_notional
            .is_none_or(|minimum| event.notional() >= minimum);

        symbol_ok && notional_ok
    }
}

/// Shared, atomically replaceable filter configuration.
#[derive(Debug)]
pub struct FilterHandle {
    current: ArcSwap<FilterConfig>,
}

impl FilterHandle {
    /// Create a handle holding `config`.
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
        }
    }

    /// Current configuration. Never blocks writers or other readers.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FilterConfig> {
        self.current.load_full()
    }

    /// Evaluate `event` against the current configuration.
    #[must_use]
    pub fn accept(&self, event: &TradeEvent) -> bool {
        self.current.load().accept(event)
    }

    /// Replace the configuration. Returns the previous one.
    pub fn replace(&self, config: FilterConfig) -> Arc<FilterConfig> {
        tracing::info!(
            allowed_symbols = config.allowed_symbols.len(),
            minimum_notional = ?config.minimum_notional,
            "Replacing filter configuration"
        );
        self.current.swap(Arc::new(config))
    }
}

impl Default for FilterHandle {
    fn default() -> Self {
        Self::new(FilterConfig::allow_all())
    }
}

/// Shared filter handle reference.
pub type SharedFilter = Arc<FilterHandle>;
