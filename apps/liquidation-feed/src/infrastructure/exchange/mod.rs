//! Exchange Connectivity
//!
//! Per-exchange WebSocket adapters, their reconnect and heartbeat policies,
//! the subscribe handshakes, and payload normalization.

pub mod adapter;
pub mod heartbeat;
pub mod normalize;
pub mod reconnect;
pub mod venue;

pub use adapter::{AdapterError, AdapterEvent, ExchangeAdapter};
pub use heartbeat::HeartbeatConfig;
pub use normalize::{NormalizeError, normalize};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use venue::ExchangeConfig;
