//! Dashboard WebSocket Feed
//!
//! Each `/ws` connection registers a broadcaster consumer and receives every
//! accepted event as a text frame:
//!
//! ```json
//! {"event":"liquidation_update","data":{"Symbol":"BTCUSDT","Side":"Sell",...}}
//! ```
//!
//! Client messages are ignored. The consumer is released when either side
//! closes.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::FixedOffset;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;

use super::HttpState;
use crate::domain::trade::{DashboardRecord, TradeEvent};
use crate::infrastructure::broadcast::Consumer;

/// Event name carried by every dashboard frame.
pub const DASHBOARD_EVENT: &str = "liquidation_update";

/// One dashboard WebSocket frame.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardFrame {
    /// Always [`DASHBOARD_EVENT`].
    pub event: &'static str,
    /// The event in dashboard shape.
    pub data: DashboardRecord,
}

impl DashboardFrame {
    /// Frame for `event` with times rendered at `display_offset`.
    #[must_use]
    pub fn new(event: &TradeEvent, display_offset: FixedOffset) -> Self {
        Self {
            event: DASHBOARD_EVENT,
            data: event.to_record(display_offset),
        }
    }
}

pub(super) async fn dashboard_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<HttpState>>,
) -> Response {
    match state.broadcaster.register("dashboard") {
        Ok(consumer) => {
            let offset = state.display_offset;
            ws.on_upgrade(move |socket| serve_dashboard(socket, consumer, offset))
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

async fn serve_dashboard(socket: WebSocket, mut consumer: Consumer, offset: FixedOffset) {
    let id = consumer.id();
    tracing::info!(consumer = %id, "Dashboard connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = consumer.recv() => {
                let Some(event) = event else {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                };
                let text = match serde_json::to_string(&DashboardFrame::new(&event, offset)) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(consumer = %id, error = %e, "Failed to encode dashboard frame");
                        continue;
                    }
                };
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(consumer = %id, dropped = consumer.dropped(), "Dashboard disconnected");
}
