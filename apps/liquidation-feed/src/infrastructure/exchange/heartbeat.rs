//! Connection Liveness
//!
//! Exchanges go quiet without closing the socket more often than they
//! disconnect cleanly. The adapter pings on a fixed interval and treats a
//! connection with no inbound traffic for longer than the timeout as dead.

use std::time::{Duration, Instant};

use crate::infrastructure::config::WebSocketSettings;

/// Ping cadence and silence tolerance.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between liveness checks (and pings).
    pub ping_interval: Duration,
    /// Maximum silence before the connection is considered dead.
    pub idle_timeout: Duration,
    /// Maximum time to establish the connection, handshakes included.
    pub connect_timeout: Duration,
}

/// Default for [`HeartbeatConfig::connect_timeout`].
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(20), Duration::from_secs(40))
    }
}

impl HeartbeatConfig {
    /// Create a configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, idle_timeout: Duration) -> Self {
        Self {
            ping_interval,
            idle_timeout,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Override the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Build from the WebSocket section of the service configuration.
    #[must_use]
    pub const fn from_websocket_settings(settings: &WebSocketSettings) -> Self {
        Self {
            ping_interval: settings.heartbeat_interval,
            idle_timeout: settings.heartbeat_timeout,
            connect_timeout: settings.connect_timeout,
        }
    }
}

/// What the adapter should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Connection is alive; send a ping to keep it that way.
    SendPing,
    /// Nothing received within the idle timeout.
    Timeout,
}

/// Per-connection liveness tracker.
#[derive(Debug)]
pub struct Heartbeat {
    config: HeartbeatConfig,
    last_activity: Instant,
}

impl Heartbeat {
    /// Start tracking from now.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            last_activity: Instant::now(),
        }
    }

    /// Interval for the adapter's tick timer.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.config.ping_interval
    }

    /// Any inbound frame (data, ping or pong) proves the peer is alive.
    pub fn record_activity(&mut self) {
        self.last_activity = Instant::now();
    }

    /// Time since the last inbound frame.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Decide the action for a tick.
    #[must_use]
    pub fn on_tick(&self) -> HeartbeatAction {
        if self.idle_for() > self.config.idle_timeout {
            HeartbeatAction::Timeout
        } else {
            HeartbeatAction::SendPing
        }
    }
}
