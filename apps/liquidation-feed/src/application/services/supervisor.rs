//! Connection Supervisor
//!
//! Starts one adapter task and one pipeline task per exchange, wired by a
//! bounded channel so each exchange's frames are processed in arrival order.
//! Exchanges share nothing but the filter and the broadcaster: one exchange
//! backing off never stalls another.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::pipeline::Pipeline;
use crate::domain::filter::SharedFilter;
use crate::domain::streaming::{AdapterState, ExchangeStatus, ExchangeStatusSnapshot};
use crate::domain::trade::Exchange;
use crate::infrastructure::broadcast::SharedBroadcaster;
use crate::infrastructure::config::WebSocketSettings;
use crate::infrastructure::exchange::{
    AdapterError, ExchangeAdapter, ExchangeConfig, HeartbeatConfig, ReconnectConfig,
};
use crate::infrastructure::metrics;

/// Adapter → pipeline channel capacity.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Connection policies applied to every adapter.
#[derive(Debug, Clone, Default)]
pub struct SupervisorSettings {
    /// Backoff between connection attempts.
    pub reconnect: ReconnectConfig,
    /// Ping cadence and idle timeout.
    pub heartbeat: HeartbeatConfig,
}

impl From<&WebSocketSettings> for SupervisorSettings {
    fn from(settings: &WebSocketSettings) -> Self {
        Self {
            reconnect: ReconnectConfig::from_websocket_settings(settings),
            heartbeat: HeartbeatConfig::from_websocket_settings(settings),
        }
    }
}

/// How an adapter stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Both tasks finished within the timeout.
    Graceful,
    /// Timeout elapsed; tasks were aborted.
    Aborted,
}

// =============================================================================
// Adapter Handle
// =============================================================================

/// Running adapter/pipeline pair for one exchange.
#[derive(Debug)]
pub struct AdapterHandle {
    exchange: Exchange,
    cancel: CancellationToken,
    adapter: JoinHandle<Result<(), AdapterError>>,
    pipeline: JoinHandle<()>,
    status: Arc<ExchangeStatus>,
}

impl AdapterHandle {
    /// Exchange this handle controls.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// Live status shared with the pipeline.
    #[must_use]
    pub const fn status(&self) -> &Arc<ExchangeStatus> {
        &self.status
    }

    /// Whether the adapter task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.adapter.is_finished()
    }

    /// Cancel the adapter and wait up to `timeout` for both tasks to finish.
    /// Tasks still running after the timeout are aborted.
    pub async fn stop(mut self, timeout: Duration) -> StopOutcome {
        self.cancel.cancel();

        let joined = tokio::time::timeout(timeout, async {
            if let Ok(Err(e)) = (&mut self.adapter).await {
                tracing::warn!(exchange = %self.exchange, error = %e, "Adapter exited with error");
            }
            let _ = (&mut self.pipeline).await;
        })
        .await;

        if joined.is_ok() {
            tracing::info!(exchange = %self.exchange, "Adapter stopped");
            StopOutcome::Graceful
        } else {
            tracing::warn!(
                exchange = %self.exchange,
                timeout_ms = timeout.as_millis(),
                "Adapter did not stop in time, aborting"
            );
            self.adapter.abort();
            self.pipeline.abort();
            self.status.set_state(AdapterState::Disconnected);
            metrics::set_adapter_state(self.exchange, AdapterState::Disconnected);
            StopOutcome::Aborted
        }
    }
}

// =============================================================================
// Supervisor
// =============================================================================

/// Owns every running adapter.
#[derive(Debug)]
pub struct ConnectionSupervisor {
    filter: SharedFilter,
    broadcaster: SharedBroadcaster,
    settings: SupervisorSettings,
    cancel: CancellationToken,
    handles: Vec<AdapterHandle>,
}

impl ConnectionSupervisor {
    /// Create a supervisor. Adapters it starts are cancelled with `cancel`.
    #[must_use]
    pub const fn new(
        filter: SharedFilter,
        broadcaster: SharedBroadcaster,
        settings: SupervisorSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            filter,
            broadcaster,
            settings,
            cancel,
            handles: Vec::new(),
        }
    }

    /// Spawn the adapter and pipeline tasks for one exchange.
    ///
    /// The returned handle is independent of the supervisor; use
    /// [`ConnectionSupervisor::start_all`] to have the supervisor track it.
    #[must_use]
    pub fn start(&self, config: ExchangeConfig) -> AdapterHandle {
        let exchange = config.exchange;
        let status = Arc::new(ExchangeStatus::new(exchange));
        let cancel = self.cancel.child_token();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let pipeline = Pipeline::new(
            exchange,
            Arc::clone(&self.filter),
            Arc::clone(&self.broadcaster),
            Arc::clone(&status),
        );
        let adapter = ExchangeAdapter::new(
            config,
            self.settings.reconnect.clone(),
            self.settings.heartbeat.clone(),
            tx,
            cancel.clone(),
        );

        tracing::info!(exchange = %exchange, "Starting adapter");

        AdapterHandle {
            exchange,
            cancel,
            pipeline: tokio::spawn(pipeline.run(rx)),
            adapter: tokio::spawn(adapter.run()),
            status,
        }
    }

    /// Start every configured exchange and keep the handles.
    pub fn start_all(&mut self, configs: impl IntoIterator<Item = ExchangeConfig>) {
        for config in configs {
            let handle = self.start(config);
            self.handles.push(handle);
        }
    }

    /// Status objects of the tracked adapters, in start order.
    #[must_use]
    pub fn statuses(&self) -> Vec<Arc<ExchangeStatus>> {
        self.handles.iter().map(|h| Arc::clone(&h.status)).collect()
    }

    /// Snapshots of the tracked adapters, in start order.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ExchangeStatusSnapshot> {
        self.handles.iter().map(|h| h.status.snapshot()).collect()
    }

    /// Stop every tracked adapter, each with its own `timeout`.
    pub async fn stop_all(&mut self, timeout: Duration) -> Vec<(Exchange, StopOutcome)> {
        let handles = std::mem::take(&mut self.handles);
        let stops = handles.into_iter().map(|handle| async move {
            let exchange = handle.exchange();
            (exchange, handle.stop(timeout).await)
        });
        futures_util::future::join_all(stops).await
    }
}
