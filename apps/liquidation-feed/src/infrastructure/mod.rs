//! Infrastructure Layer - Adapters and external integrations.
//!
//! Exchange connectivity, fan-out, the HTTP surface and the operational
//! plumbing around them.

/// Exchange WebSocket adapters, handshakes and payload normalization.
pub mod exchange;

/// Consumer registry and event fan-out.
pub mod broadcast;

/// Webhook alert sink.
pub mod alert;

/// Configuration loading.
pub mod config;

/// Status, health, metrics, filter admin and dashboard WebSocket routes.
pub mod http;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Logging and OpenTelemetry tracing.
pub mod telemetry;
