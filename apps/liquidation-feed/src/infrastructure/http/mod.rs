//! HTTP Surface
//!
//! One axum server carries everything downstream of the pipeline.
//!
//! # Endpoints
//!
//! - `GET /` - Service banner
//! - `GET /ws` - Dashboard WebSocket feed
//! - `GET /health` - JSON health status with per-exchange adapter state
//! - `GET /healthz` - Kubernetes liveness probe (simple OK)
//! - `GET /readyz` - Kubernetes readiness probe (any exchange streaming)
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /filter`, `PUT /filter` - Read or replace the event filter

mod dashboard;
mod health;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, routing::get};
use chrono::FixedOffset;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::domain::filter::{FilterConfig, SharedFilter};
use crate::domain::streaming::ExchangeStatus;
use crate::infrastructure::broadcast::SharedBroadcaster;

pub use dashboard::{DASHBOARD_EVENT, DashboardFrame};
pub use health::{ConsumersStatus, HealthResponse, HealthStatus, determine_health_status};

// =============================================================================
// Server State
// =============================================================================

/// Shared state for every route.
pub struct HttpState {
    version: String,
    started_at: Instant,
    statuses: Vec<Arc<ExchangeStatus>>,
    broadcaster: SharedBroadcaster,
    filter: SharedFilter,
    display_offset: FixedOffset,
    metrics: Option<PrometheusHandle>,
}

impl HttpState {
    /// Create state over the running feed's shared components.
    #[must_use]
    pub fn new(
        statuses: Vec<Arc<ExchangeStatus>>,
        broadcaster: SharedBroadcaster,
        filter: SharedFilter,
        display_offset: FixedOffset,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Instant::now(),
            statuses,
            broadcaster,
            filter,
            display_offset,
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Build the router. Exposed so tests can serve it on an ephemeral port.
pub fn router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(dashboard::dashboard_handler))
        .route("/health", get(health::health_handler))
        .route("/healthz", get(health::liveness_handler))
        .route("/readyz", get(health::readiness_handler))
        .route("/metrics", get(health::metrics_handler))
        .route("/filter", get(get_filter_handler).put(put_filter_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Status, health, metrics and dashboard server.
pub struct HttpServer {
    port: u16,
    state: Arc<HttpState>,
    cancel: CancellationToken,
}

impl HttpServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<HttpState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Bind to all interfaces and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server encounters a
    /// fatal error while running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        self.serve(listener).await
    }

    /// Serve on an already-bound listener until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if the server encounters a fatal error.
    pub async fn serve(self, listener: TcpListener) -> Result<(), HttpServerError> {
        let port = listener.local_addr().map_or(self.port, |addr| addr.port());
        tracing::info!(port, "HTTP server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn index_handler() -> Json<Value> {
    Json(json!({"status": "Backend is running!"}))
}

async fn get_filter_handler(State(state): State<Arc<HttpState>>) -> Json<FilterConfig> {
    Json(FilterConfig::clone(&state.filter.snapshot()))
}

async fn put_filter_handler(
    State(state): State<Arc<HttpState>>,
    Json(config): Json<FilterConfig>,
) -> Json<FilterConfig> {
    state.filter.replace(config.clone());
    Json(config)
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
