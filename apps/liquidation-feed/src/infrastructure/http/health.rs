//! Health, readiness and metrics handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::HttpState;
use crate::domain::filter::FilterConfig;
use crate::domain::streaming::ExchangeStatusSnapshot;
use crate::infrastructure::broadcast::ConsumerInfo;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Per-exchange adapter status, in start order.
    pub exchanges: Vec<ExchangeStatusSnapshot>,
    /// Registered downstream consumers.
    pub consumers: ConsumersStatus,
    /// Active filter.
    pub filter: FilterConfig,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every exchange is streaming.
    Healthy,
    /// Some exchanges are streaming.
    Degraded,
    /// No exchange is streaming.
    Unhealthy,
}

/// Consumer registry summary.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumersStatus {
    /// Number of registered consumers.
    pub total: usize,
    /// Registry entries, oldest first.
    pub registered: Vec<ConsumerInfo>,
}

/// Healthy when every exchange streams, degraded when some do.
#[must_use]
pub fn determine_health_status(exchanges: &[ExchangeStatusSnapshot]) -> HealthStatus {
    let connected = exchanges.iter().filter(|e| e.connected).count();
    if connected == exchanges.len() {
        HealthStatus::Healthy
    } else if connected > 0 {
        HealthStatus::Degraded
    } else {
        HealthStatus::Unhealthy
    }
}

pub(super) async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

pub(super) async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub(super) async fn readiness_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    if state.statuses.iter().any(|s| s.snapshot().connected) {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

pub(super) async fn metrics_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    state.metrics.as_ref().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &HttpState) -> HealthResponse {
    let exchanges: Vec<_> = state.statuses.iter().map(|s| s.snapshot()).collect();
    let registered = state.broadcaster.consumers();

    HealthResponse {
        status: determine_health_status(&exchanges),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        exchanges,
        consumers: ConsumersStatus {
            total: registered.len(),
            registered,
        },
        filter: FilterConfig::clone(&state.filter.snapshot()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::streaming::{AdapterState, ExchangeStatus};
    use crate::domain::trade::Exchange;

    fn snapshot(exchange: Exchange, streaming: bool) -> ExchangeStatusSnapshot {
        let status = ExchangeStatus::new(exchange);
        if streaming {
            status.set_state(AdapterState::Streaming);
        }
        status.snapshot()
    }

    #[test]
    fn health_status_serialization() {
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }

    #[test]
    fn all_streaming_is_healthy() {
        let exchanges = [snapshot(Exchange::Binance, true), snapshot(Exchange::Okx, true)];
        assert_eq!(determine_health_status(&exchanges), HealthStatus::Healthy);
    }

    #[test]
    fn some_streaming_is_degraded() {
        let exchanges = [snapshot(Exchange::Binance, true), snapshot(Exchange::Okx, false)];
        assert_eq!(determine_health_status(&exchanges), HealthStatus::Degraded);
    }

    #[test]
    fn none_streaming_is_unhealthy() {
        let exchanges = [snapshot(Exchange::Kraken, false)];
        assert_eq!(determine_health_status(&exchanges), HealthStatus::Unhealthy);
    }
}
