//! Reconnection Backoff
//!
//! Exponential backoff with jitter for exchange adapters. Adapters never give
//! up: the policy only decides how long the `Backoff` state lasts.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::WebSocketSettings;

/// Configuration for reconnection delays.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Growth factor applied after every failed attempt.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_factor: f64,
    /// How long a connection must keep streaming before the backoff resets.
    pub stable_after: Duration,
}

/// Default for [`ReconnectConfig::stable_after`].
pub const DEFAULT_STABLE_AFTER: Duration = Duration::from_secs(10);

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter_factor: 0.1,
            stable_after: DEFAULT_STABLE_AFTER,
        }
    }
}

impl ReconnectConfig {
    /// Build from the WebSocket section of the service configuration.
    #[must_use]
    pub fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            initial_delay: settings.reconnect_delay_initial,
            max_delay: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            stable_after: settings.reconnect_stable_after,
            ..Self::default()
        }
    }

    /// Fixed delay without growth or jitter. Handy in tests.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter_factor: 0.0,
            stable_after: DEFAULT_STABLE_AFTER,
        }
    }

    /// Override [`ReconnectConfig::stable_after`].
    #[must_use]
    pub const fn with_stable_after(mut self, stable_after: Duration) -> Self {
        self.stable_after = stable_after;
        self
    }
}

/// Backoff state for one adapter.
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    /// Create a policy starting at the initial delay.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt; advances the backoff.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = self.apply_jitter(self.current_delay);

        #[allow(clippy::cast_precision_loss)]
        let scaled = (self.current_delay.as_millis() as f64 * self.config.multiplier).round();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let next_millis = if scaled.is_finite() && scaled > 0.0 {
            scaled as u128
        } else {
            0
        };
        let capped = next_millis.min(self.config.max_delay.as_millis());
        self.current_delay = Duration::from_millis(u64::try_from(capped).unwrap_or(u64::MAX));

        delay
    }

    /// Return to the initial delay once a connection has streamed for
    /// [`ReconnectConfig::stable_after`].
    pub const fn reset(&mut self) {
        self.current_delay = self.config.initial_delay;
        self.attempt_count = 0;
    }

    /// Attempts since the last reset.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 {
            return duration;
        }

        #[allow(clippy::cast_precision_loss)]
        let base_millis = duration.as_millis() as f64;
        let jitter_range = base_millis * self.config.jitter_factor;
        let jitter: f64 = rand::rng().random_range(-jitter_range..=jitter_range);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let adjusted = (base_millis + jitter).max(1.0) as u64;
        Duration::from_millis(adjusted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(initial_ms: u64, max_ms: u64, multiplier: f64) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            multiplier,
            jitter_factor: 0.0,
            stable_after: DEFAULT_STABLE_AFTER,
        }
    }

    #[test]
    fn default_config_values() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_millis(500));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!((config.multiplier - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn delays_grow_exponentially() {
        let mut policy = ReconnectPolicy::new(no_jitter(100, 10_000, 2.0));
        let delays: Vec<_> = (0..4).map(|_| policy.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
        assert_eq!(policy.attempt_count(), 4);
    }

    #[test]
    fn delays_are_capped() {
        let mut policy = ReconnectPolicy::new(no_jitter(1_000, 2_000, 4.0));
        let _ = policy.next_delay();
        assert_eq!(policy.next_delay(), Duration::from_millis(2_000));
        assert_eq!(policy.next_delay(), Duration::from_millis(2_000));
    }

    #[test]
    fn reset_restarts_from_initial_delay() {
        let mut policy = ReconnectPolicy::new(no_jitter(100, 10_000, 2.0));
        let _ = policy.next_delay();
        let _ = policy.next_delay();
        policy.reset();
        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        for _ in 0..100 {
            let mut policy = ReconnectPolicy::new(ReconnectConfig {
                jitter_factor: 0.1,
                ..no_jitter(1_000, 10_000, 2.0)
            });
            let millis = policy.next_delay().as_millis();
            assert!((900..=1_100).contains(&millis), "delay {millis}ms out of range");
        }
    }

    #[test]
    fn never_gives_up() {
        let mut policy = ReconnectPolicy::new(ReconnectConfig::fixed(Duration::from_millis(5)));
        for _ in 0..10_000 {
            assert_eq!(policy.next_delay(), Duration::from_millis(5));
        }
    }
}
