//! Domain Layer - Canonical events, filtering and streaming state.
//!
//! This layer contains the exchange-agnostic core types. Nothing here
//! performs I/O; everything is safe to share across adapter tasks.

/// Canonical trade events and the dashboard record shape.
pub mod trade;

/// Symbol and notional filtering with atomically swappable configuration.
pub mod filter;

/// Adapter lifecycle states and per-exchange status counters.
pub mod streaming;
