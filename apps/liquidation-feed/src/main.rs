//! Liquidation Feed Binary
//!
//! Connects to every configured exchange and serves the dashboard feed.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin liquidation-feed
//! ```
//!
//! # Environment Variables
//!
//! - `FEED_EXCHANGES`: Exchanges to start (default: binance,kraken,coinbase,okx)
//! - `FEED_ALLOWED_SYMBOLS`: Comma list of symbols to pass (default: all)
//! - `FEED_MIN_NOTIONAL`: Notional floor, `none` to disable (default: 500)
//! - `FEED_DISPLAY_UTC_OFFSET`: Offset for `Trade Time` (default: +09:00)
//! - `KRAKEN_PAIRS`, `COINBASE_PRODUCTS`, `OKX_INST_IDS`: Subscribed instruments
//! - `PORT`: HTTP port for status, health, metrics and `/ws` (default: 5000)
//! - `ALERT_WEBHOOK_URL`: Enables webhook alerts; `ALERT_MIN_NOTIONAL` (default: 100000)
//! - `OTEL_ENABLED`: Enable OpenTelemetry span export (default: false)
//! - `RUST_LOG`: Log filter (default: liquidation_feed=info)

use std::sync::Arc;
use std::time::Duration;

use liquidation_feed::application::services::{AlertService, ConnectionSupervisor, SupervisorSettings};
use liquidation_feed::infrastructure::alert::WebhookAlertSink;
use liquidation_feed::infrastructure::http::{HttpServer, HttpState};
use liquidation_feed::infrastructure::telemetry;
use liquidation_feed::{Broadcaster, FeedConfig, FilterHandle, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How long the HTTP server gets to drain after the broadcaster closes.
const HTTP_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Already installed is fine.
    let _ = rustls::crypto::ring::default_provider().install_default();

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting liquidation feed");

    let metrics_handle = init_metrics()?;

    let config = FeedConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let http_shutdown = CancellationToken::new();

    let filter = Arc::new(FilterHandle::new(config.filter.clone()));
    let broadcaster = Arc::new(Broadcaster::new(config.broadcast.capacity));

    let mut supervisor = ConnectionSupervisor::new(
        Arc::clone(&filter),
        Arc::clone(&broadcaster),
        SupervisorSettings::from(&config.websocket),
        shutdown_token.clone(),
    );
    supervisor.start_all(config.exchanges.clone());

    if let Some(alerts) = &config.alerts {
        let sink = Arc::new(WebhookAlertSink::new(alerts)?);
        let service = AlertService::new(sink, alerts.min_notional, config.display_offset);
        let consumer = broadcaster.register("alerts")?;
        tokio::spawn(service.run(consumer, shutdown_token.clone()));
    }

    let http_state = HttpState::new(
        supervisor.statuses(),
        Arc::clone(&broadcaster),
        Arc::clone(&filter),
        config.display_offset,
    )
    .with_metrics(metrics_handle);
    let http_server = HttpServer::new(config.server.port, Arc::new(http_state), http_shutdown.clone());
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run().await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });

    tracing::info!("Liquidation feed ready");

    await_shutdown(shutdown_token).await;

    for (exchange, outcome) in supervisor.stop_all(config.shutdown_timeout).await {
        tracing::debug!(exchange = %exchange, ?outcome, "Exchange stopped");
    }
    broadcaster.shutdown();
    http_shutdown.cancel();

    if tokio::time::timeout(HTTP_DRAIN_TIMEOUT, http_task).await.is_err() {
        tracing::warn!("HTTP server did not drain in time");
    }

    tracing::info!("Liquidation feed stopped");
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        exchanges = ?config.exchange_names(),
        port = config.server.port,
        display_offset = %config.display_offset,
        minimum_notional = ?config.filter.minimum_notional,
        allowed_symbols = config.filter.allowed_symbols.len(),
        alerts = config.alerts.is_some(),
        "Configuration loaded"
    );
    for exchange in &config.exchanges {
        tracing::debug!(
            exchange = %exchange.exchange,
            url = %exchange.url,
            instruments = ?exchange.instruments,
            "Exchange endpoint"
        );
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}
