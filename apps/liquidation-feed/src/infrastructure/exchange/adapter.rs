//! Exchange WebSocket Adapter
//!
//! Owns one upstream connection and drives it through
//! `Connecting → Subscribing → Streaming → Backoff → Connecting ...` until
//! cancelled. Decoded payloads and lifecycle changes are sent, in order, on
//! a bounded channel to the exchange's pipeline task.
//!
//! Payloads are only emitted while `Streaming`. For exchanges with a
//! subscribe handshake the first frame after the handshake flips the state to
//! `Streaming` and is forwarded like any other frame.
//!
//! Reaching `Streaming` does not reset the backoff. A connection has to keep
//! streaming for [`ReconnectConfig::stable_after`] first, so a server that
//! accepts, sends one frame and closes still sees growing delays.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::heartbeat::{Heartbeat, HeartbeatAction, HeartbeatConfig};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::venue::ExchangeConfig;
use crate::domain::streaming::AdapterState;
use crate::domain::trade::Exchange;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a single connection attempt.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Subscribe message could not be built.
    #[error("failed to encode subscribe message: {0}")]
    Handshake(#[from] serde_json::Error),

    /// TCP connect plus WebSocket handshake did not finish in time.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Nothing received within the idle timeout.
    #[error("no traffic for {0:?}")]
    HeartbeatTimeout(Duration),

    /// Server sent a close frame.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// Stream ended without a close frame.
    #[error("stream ended")]
    StreamEnded,

    /// The pipeline stopped listening.
    #[error("event channel closed")]
    ChannelClosed,
}

// =============================================================================
// Adapter Events
// =============================================================================

/// What an adapter reports to its pipeline.
#[derive(Debug, Clone)]
pub enum AdapterEvent {
    /// Lifecycle transition.
    State(AdapterState),
    /// Connection lost; waiting before the next attempt.
    Backoff {
        /// Attempt number since the connection was last stable.
        attempt: u32,
        /// Delay before reconnecting.
        delay: Duration,
        /// Why the previous connection ended.
        reason: String,
    },
    /// Connection has streamed long enough for the backoff to start over.
    Stable,
    /// Decoded JSON payload received while streaming.
    Payload(Value),
    /// Frame received while streaming that was not valid JSON.
    DecodeFailed(String),
}

// =============================================================================
// Adapter
// =============================================================================

/// Connection driver for one exchange.
pub struct ExchangeAdapter {
    config: ExchangeConfig,
    reconnect: ReconnectConfig,
    heartbeat: HeartbeatConfig,
    events: mpsc::Sender<AdapterEvent>,
    cancel: CancellationToken,
}

impl ExchangeAdapter {
    /// Create an adapter. Nothing happens until [`ExchangeAdapter::run`].
    #[must_use]
    pub const fn new(
        config: ExchangeConfig,
        reconnect: ReconnectConfig,
        heartbeat: HeartbeatConfig,
        events: mpsc::Sender<AdapterEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            reconnect,
            heartbeat,
            events,
            cancel,
        }
    }

    /// Exchange this adapter connects to.
    #[must_use]
    pub const fn exchange(&self) -> Exchange {
        self.config.exchange
    }

    /// Run the connection loop until cancelled.
    ///
    /// Connection failures never end the loop; they move the adapter to
    /// `Backoff` and it tries again.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::ChannelClosed`] if the pipeline receiver was
    /// dropped.
    pub async fn run(self) -> Result<(), AdapterError> {
        let exchange = self.exchange();
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.connect_and_stream(&mut policy).await {
                Ok(()) => break,
                Err(AdapterError::ChannelClosed) => return Err(AdapterError::ChannelClosed),
                Err(e) => {
                    let delay = policy.next_delay();
                    let attempt = policy.attempt_count();
                    tracing::warn!(
                        exchange = %exchange,
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis(),
                        "Connection lost, backing off"
                    );

                    self.emit(AdapterEvent::Backoff {
                        attempt,
                        delay,
                        reason: e.to_string(),
                    })
                    .await?;

                    tokio::select! {
                        () = self.cancel.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        tracing::info!(exchange = %exchange, "Adapter stopped");
        let _ = self
            .events
            .send(AdapterEvent::State(AdapterState::Disconnected))
            .await;
        Ok(())
    }

    /// One connection attempt. `Ok` only when cancelled.
    async fn connect_and_stream(&self, policy: &mut ReconnectPolicy) -> Result<(), AdapterError> {
        let exchange = self.exchange();
        self.emit(AdapterEvent::State(AdapterState::Connecting))
            .await?;
        tracing::info!(exchange = %exchange, url = %self.config.url, "Connecting");

        let connect_timeout = self.heartbeat.connect_timeout;
        let connect = tokio::time::timeout(
            connect_timeout,
            tokio_tungstenite::connect_async(&self.config.url),
        );
        let (ws_stream, _response) = tokio::select! {
            () = self.cancel.cancelled() => return Ok(()),
            result = connect => result.map_err(|_| AdapterError::ConnectTimeout(connect_timeout))??,
        };
        let (mut write, mut read) = ws_stream.split();

        let mut state = match self.config.subscribe_message()? {
            Some(message) => {
                tracing::debug!(exchange = %exchange, %message, "Sending subscribe message");
                write.send(Message::Text(message.into())).await?;
                AdapterState::Subscribing
            }
            None => AdapterState::Streaming,
        };
        tracing::info!(exchange = %exchange, state = state.as_str(), "Connected");
        self.emit(AdapterEvent::State(state)).await?;

        let mut stable_at =
            (state == AdapterState::Streaming).then(|| Instant::now() + self.reconnect.stable_after);

        let mut heartbeat = Heartbeat::new(self.heartbeat.clone());
        let mut ticker =
            tokio::time::interval_at(Instant::now() + heartbeat.interval(), heartbeat.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                () = wait_until(stable_at) => {
                    stable_at = None;
                    policy.reset();
                    tracing::debug!(exchange = %exchange, "Connection stable, backoff reset");
                    self.emit(AdapterEvent::Stable).await?;
                }
                _ = ticker.tick() => match heartbeat.on_tick() {
                    HeartbeatAction::SendPing => {
                        write.send(Message::Ping(Vec::<u8>::new().into())).await?;
                    }
                    HeartbeatAction::Timeout => {
                        return Err(AdapterError::HeartbeatTimeout(heartbeat.idle_for()));
                    }
                },
                frame = read.next() => {
                    let Some(frame) = frame else {
                        return Err(AdapterError::StreamEnded);
                    };
                    let frame = frame?;
                    heartbeat.record_activity();

                    let started = match frame {
                        Message::Text(text) => self.on_data(text.as_str().as_bytes(), &mut state).await?,
                        Message::Binary(bytes) => self.on_data(&bytes, &mut state).await?,
                        Message::Ping(data) => {
                            write.send(Message::Pong(data)).await?;
                            false
                        }
                        Message::Close(frame) => {
                            tracing::info!(exchange = %exchange, ?frame, "Server sent close frame");
                            return Err(AdapterError::ConnectionClosed);
                        }
                        _ => false,
                    };
                    if started {
                        stable_at = Some(Instant::now() + self.reconnect.stable_after);
                    }
                }
            }
        }
    }

    /// Forward one data frame. Returns whether it moved the adapter from
    /// `Subscribing` to `Streaming`.
    async fn on_data(&self, bytes: &[u8], state: &mut AdapterState) -> Result<bool, AdapterError> {
        let started = *state == AdapterState::Subscribing;
        if started {
            *state = AdapterState::Streaming;
            tracing::info!(exchange = %self.exchange(), "Subscription active, streaming");
            self.emit(AdapterEvent::State(AdapterState::Streaming))
                .await?;
        }

        tracing::trace!(exchange = %self.exchange(), bytes = bytes.len(), "Frame received");

        let event = match serde_json::from_slice::<Value>(bytes) {
            Ok(payload) => AdapterEvent::Payload(payload),
            Err(e) => {
                tracing::debug!(exchange = %self.exchange(), error = %e, "Dropping undecodable frame");
                AdapterEvent::DecodeFailed(e.to_string())
            }
        };
        self.emit(event).await?;
        Ok(started)
    }

    async fn emit(&self, event: AdapterEvent) -> Result<(), AdapterError> {
        self.events
            .send(event)
            .await
            .map_err(|_| AdapterError::ChannelClosed)
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
