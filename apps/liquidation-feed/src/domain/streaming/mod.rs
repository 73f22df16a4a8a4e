//! Exchange Streaming State
//!
//! Lifecycle states of an exchange adapter and the per-exchange status
//! counters exposed on the health endpoint.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::domain::trade::Exchange;

/// Connection lifecycle of one exchange adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterState {
    /// No connection and no attempt in progress.
    #[default]
    Disconnected,
    /// Transport-level connect in progress.
    Connecting,
    /// Subscribe handshake sent, waiting for the first frame.
    Subscribing,
    /// Receiving frames; payloads flow into the pipeline.
    Streaming,
    /// Waiting before the next connection attempt.
    Backoff,
}

impl AdapterState {
    /// Lowercase name for logs and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Backoff => "backoff",
        }
    }

    /// Numeric code for the state gauge.
    #[must_use]
    pub const fn code(&self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Subscribing => 2,
            Self::Streaming => 3,
            Self::Backoff => 4,
        }
    }
}

/// Observable status of one exchange, shared between its tasks and the
/// health endpoint.
#[derive(Debug)]
pub struct ExchangeStatus {
    exchange: Exchange,
    state: RwLock<AdapterState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    frames_received: AtomicU64,
    decode_failures: AtomicU64,
    normalize_failures: AtomicU64,
    events_published: AtomicU64,
    events_filtered: AtomicU64,
}

impl ExchangeStatus {
    /// Fresh status in the `Disconnected` state.
    #[must_use]
    pub const fn new(exchange: Exchange) -> Self {
        Self {
            exchange,
            state: RwLock::new(AdapterState::Disconnected),
            last_connected_at: RwLock::new(None),
            last_error: RwLock::new(None),
            reconnect_attempts: AtomicU32::new(0),
            frames_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            normalize_failures: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            events_filtered: AtomicU64::new(0),
        }
    }

    /// Exchange this status belongs to.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Record a state transition.
    pub fn set_state(&self, state: AdapterState) {
        *self.state.write() = state;
        if state == AdapterState::Streaming {
            *self.last_connected_at.write() = Some(Utc::now());
        }
    }

    /// The connection has stayed up long enough to count as recovered.
    pub fn mark_stable(&self) {
        self.reconnect_attempts.store(0, Ordering::Relaxed);
        *self.last_error.write() = None;
    }

    /// Remember the most recent transport error.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Count a reconnection attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame received while streaming.
    pub fn increment_frames(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a frame that was not valid JSON.
    pub fn increment_decode_failures(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a payload the normalizer rejected.
    pub fn increment_normalize_failures(&self) {
        self.normalize_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event handed to the broadcaster.
    pub fn increment_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an event the filter rejected.
    pub fn increment_filtered(&self) {
        self.events_filtered.fetch_add(1, Ordering::Relaxed);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> AdapterState {
        *self.state.read()
    }

    /// Point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> ExchangeStatusSnapshot {
        let state = self.state();
        ExchangeStatusSnapshot {
            exchange: self.exchange,
            state,
            connected: state == AdapterState::Streaming,
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            normalize_failures: self.normalize_failures.load(Ordering::Relaxed),
            events_published: self.events_published.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of an [`ExchangeStatus`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeStatusSnapshot {
    /// Exchange name.
    pub exchange: Exchange,
    /// Lifecycle state.
    pub state: AdapterState,
    /// Whether the adapter is streaming.
    pub connected: bool,
    /// When the adapter last reached `Streaming`.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent transport error since the connection was last stable.
    pub last_error: Option<String>,
    /// Reconnect attempts since the connection was last stable.
    pub reconnect_attempts: u32,
    /// Frames received while streaming.
    pub frames_received: u64,
    /// Frames that were not valid JSON.
    pub decode_failures: u64,
    /// Payloads that did not map to a trade event.
    pub normalize_failures: u64,
    /// Events handed to the broadcaster.
    pub events_published: u64,
    /// Events rejected by the filter.
    pub events_filtered: u64,
}
