//! Configuration Module
//!
//! Environment-driven configuration for the feed service.

mod settings;

pub use settings::{
    AlertSettings, BroadcastSettings, ConfigError, DEFAULT_ALERT_MIN_NOTIONAL,
    DEFAULT_MIN_NOTIONAL, FeedConfig, ServerSettings, WebSocketSettings, default_display_offset,
};
