//! Event Fan-out
//!
//! The [`Broadcaster`] keeps the registry of live downstream consumers and
//! pushes every accepted [`TradeEvent`] to all of them.
//!
//! # Architecture
//!
//! A single tokio broadcast ring backs every consumer. Each consumer's
//! receiver acts as its own bounded queue: when a consumer falls more than
//! `capacity` events behind, the oldest events are dropped for that consumer
//! only, and the drop is counted. Publishing never waits on a consumer.
//!
//! Consumers deregister themselves when dropped, so a dashboard socket that
//! disconnects without a clean unregister never leaks a registry entry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::trade::TradeEvent;
use crate::infrastructure::metrics;

/// Default per-consumer queue bound.
pub const DEFAULT_CAPACITY: usize = 1024;

// =============================================================================
// Errors
// =============================================================================

/// Broadcaster errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BroadcastError {
    /// The broadcaster has been shut down.
    #[error("broadcaster is shut down")]
    Closed,
}

// =============================================================================
// Consumer Registry
// =============================================================================

/// Opaque identifier of a registered consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl ConsumerId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry entry for a consumer.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerInfo {
    /// Consumer id.
    pub id: String,
    /// What kind of consumer this is, e.g. `dashboard` or `alerts`.
    pub label: String,
    /// When the consumer registered.
    pub connected_at: DateTime<Utc>,
}

type Registry = Arc<RwLock<HashMap<ConsumerId, ConsumerInfo>>>;

// =============================================================================
// Consumer
// =============================================================================

/// A registered downstream receiver.
///
/// Dropping the consumer removes it from the registry.
#[derive(Debug)]
pub struct Consumer {
    id: ConsumerId,
    rx: broadcast::Receiver<Arc<TradeEvent>>,
    registry: Registry,
    dropped: u64,
}

impl Consumer {
    /// This consumer's id.
    #[must_use]
    pub const fn id(&self) -> ConsumerId {
        self.id
    }

    /// Events dropped for this consumer because it fell behind.
    #[must_use]
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Next event, in publish order. Returns `None` once the broadcaster has
    /// shut down and everything already queued has been received.
    pub async fn recv(&mut self) -> Option<Arc<TradeEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => self.on_lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Closed`] once the broadcaster has shut down
    /// and the queue is drained.
    pub fn try_recv(&mut self) -> Result<Option<Arc<TradeEvent>>, BroadcastError> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Ok(Some(event)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.on_lagged(skipped),
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => return Err(BroadcastError::Closed),
            }
        }
    }

    fn on_lagged(&mut self, skipped: u64) {
        self.dropped += skipped;
        metrics::record_consumer_dropped(skipped);
        tracing::warn!(consumer = %self.id, skipped, "Consumer fell behind, dropped oldest events");
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        let remaining = {
            let mut registry = self.registry.write();
            registry.remove(&self.id);
            registry.len()
        };
        metrics::set_consumers(remaining);
        tracing::debug!(consumer = %self.id, remaining, "Consumer unregistered");
    }
}

// =============================================================================
// Broadcaster
// =============================================================================

/// Registry of live consumers plus the fan-out channel.
#[derive(Debug)]
pub struct Broadcaster {
    sender: RwLock<Option<broadcast::Sender<Arc<TradeEvent>>>>,
    registry: Registry,
    capacity: usize,
}

impl Broadcaster {
    /// Create a broadcaster whose consumers each buffer up to `capacity`
    /// events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            registry: Arc::new(RwLock::new(HashMap::new())),
            capacity,
        }
    }

    /// Per-consumer queue bound.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a consumer. It receives every event published from now on.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Closed`] after [`Broadcaster::shutdown`].
    pub fn register(&self, label: impl Into<String>) -> Result<Consumer, BroadcastError> {
        let rx = self
            .sender
            .read()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(BroadcastError::Closed)?;

        let id = ConsumerId::generate();
        let info = ConsumerInfo {
            id: id.to_string(),
            label: label.into(),
            connected_at: Utc::now(),
        };
        tracing::debug!(consumer = %id, label = %info.label, "Consumer registered");

        let count = {
            let mut registry = self.registry.write();
            registry.insert(id, info);
            registry.len()
        };
        metrics::set_consumers(count);

        Ok(Consumer {
            id,
            rx,
            registry: Arc::clone(&self.registry),
            dropped: 0,
        })
    }

    /// Unregister a consumer. Anything still queued for it is discarded.
    pub fn unregister(&self, consumer: Consumer) {
        drop(consumer);
    }

    /// Queue `event` for every registered consumer. Returns how many
    /// consumers it was queued for.
    pub fn publish(&self, event: &TradeEvent) -> usize {
        let sender = self.sender.read().clone();
        sender.map_or(0, |sender| {
            sender.send(Arc::new(event.clone())).unwrap_or(0)
        })
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn consumer_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Registry entries, oldest first.
    #[must_use]
    pub fn consumers(&self) -> Vec<ConsumerInfo> {
        let mut consumers: Vec<_> = self.registry.read().values().cloned().collect();
        consumers.sort_by_key(|info| info.connected_at);
        consumers
    }

    /// Whether [`Broadcaster::shutdown`] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Stop accepting consumers and close the channel. Consumers still drain
    /// what was queued before shutdown.
    pub fn shutdown(&self) {
        if self.sender.write().take().is_some() {
            tracing::info!(consumers = self.consumer_count(), "Broadcaster shut down");
        }
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Shared broadcaster reference.
pub type SharedBroadcaster = Arc<Broadcaster>;
