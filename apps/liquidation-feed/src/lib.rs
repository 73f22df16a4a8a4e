#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Liquidation Feed - Exchange Trade Multiplexer
//!
//! Maintains one WebSocket connection per crypto exchange, maps each
//! exchange's liquidation or trade messages onto a single canonical event,
//! filters them, and fans them out to dashboard clients and alert sinks.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `trade`: Canonical trade event and dashboard record
//!   - `filter`: Symbol and notional filter with atomic replacement
//!   - `streaming`: Adapter lifecycle states and per-exchange status
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Alert sink contract
//!   - `services`: Per-exchange pipeline, connection supervisor, alerts
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `exchange`: WebSocket adapters, handshakes, normalization
//!   - `broadcast`: Consumer registry and fan-out
//!   - `http`: Status, health, metrics, filter admin and `/ws`
//!   - `alert`: Webhook alert sink
//!   - `config`, `metrics`, `telemetry`
//!
//! # Data Flow
//!
//! ```text
//! Binance WS ──► adapter ──► pipeline ──┐
//! Kraken WS  ──► adapter ──► pipeline ──┤    ┌─────────────┐     ┌──► /ws client 1
//! Coinbase WS──► adapter ──► pipeline ──┼───►│ Broadcaster │─────┼──► /ws client N
//! OKX WS     ──► adapter ──► pipeline ──┘    └─────────────┘     └──► alert webhook
//!                              │
//!                      normalize → filter
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::filter::{FilterConfig, FilterHandle, SharedFilter};
pub use domain::streaming::{AdapterState, ExchangeStatus, ExchangeStatusSnapshot};
pub use domain::trade::{DashboardRecord, Exchange, Side, TradeError, TradeEvent};

// Application services
pub use application::services::{
    AdapterHandle, AlertService, ConnectionSupervisor, Pipeline, StopOutcome, SupervisorSettings,
};

// Exchange connectivity
pub use infrastructure::exchange::{
    AdapterError, AdapterEvent, ExchangeAdapter, ExchangeConfig, HeartbeatConfig, NormalizeError,
    ReconnectConfig, normalize,
};

// Fan-out
pub use infrastructure::broadcast::{BroadcastError, Broadcaster, Consumer, SharedBroadcaster};

// Configuration
pub use infrastructure::config::{ConfigError, FeedConfig};

// HTTP surface
pub use infrastructure::http::{HttpServer, HttpServerError, HttpState, router};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
