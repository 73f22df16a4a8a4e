//! HTTP Surface Integration Tests
//!
//! Serves the router on an ephemeral port and exercises it with real HTTP and
//! WebSocket clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{FixedOffset, TimeZone, Utc};
use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use liquidation_feed::{
    AdapterState, Broadcaster, Exchange, ExchangeStatus, FilterConfig, FilterHandle, HttpServer,
    HttpState, Side, TradeEvent,
};

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    base: String,
    broadcaster: Arc<Broadcaster>,
    filter: Arc<FilterHandle>,
    statuses: Vec<Arc<ExchangeStatus>>,
    cancel: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start_server(exchanges: &[Exchange]) -> TestServer {
    let statuses: Vec<_> = exchanges
        .iter()
        .map(|e| Arc::new(ExchangeStatus::new(*e)))
        .collect();
    let broadcaster = Arc::new(Broadcaster::default());
    let filter = Arc::new(FilterHandle::default());
    let state = HttpState::new(
        statuses.clone(),
        Arc::clone(&broadcaster),
        Arc::clone(&filter),
        FixedOffset::east_opt(9 * 3600).unwrap(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
    let cancel = CancellationToken::new();
    let server = HttpServer::new(0, Arc::new(state), cancel.clone());
    tokio::spawn(server.serve(listener));

    TestServer {
        base,
        broadcaster,
        filter,
        statuses,
        cancel,
    }
}

fn sample_event() -> TradeEvent {
    TradeEvent::new(
        "BTCUSDT",
        Side::Sell,
        Decimal::from(50_000),
        Decimal::new(1, 2),
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
        Exchange::Binance,
    )
    .unwrap()
}

#[tokio::test]
async fn index_reports_running() {
    let server = start_server(&[]).await;
    let body: Value = reqwest::get(format!("http://{}/", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({"status": "Backend is running!"}));
}

#[tokio::test]
async fn health_reflects_adapter_states() {
    let server = start_server(&[Exchange::Binance, Exchange::Kraken]).await;
    let url = format!("http://{}/health", server.base);

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["exchanges"][0]["exchange"], "Binance");
    assert_eq!(body["exchanges"][1]["state"], "disconnected");

    server.statuses[0].set_state(AdapterState::Streaming);
    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["exchanges"][0]["connected"], true);

    let ready = reqwest::get(format!("http://{}/readyz", server.base))
        .await
        .unwrap();
    assert_eq!(ready.status(), 200);
}

#[tokio::test]
async fn metrics_unavailable_without_recorder() {
    let server = start_server(&[]).await;
    let response = reqwest::get(format!("http://{}/metrics", server.base))
        .await
        .unwrap();
    assert_eq!(response.status(), 503);
}

#[tokio::test]
async fn filter_can_be_replaced_at_runtime() {
    let server = start_server(&[]).await;
    let url = format!("http://{}/filter", server.base);
    let client = reqwest::Client::new();

    let current: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(current["minimum_notional"], Value::Null);

    let response = client
        .put(&url)
        .json(&json!({"allowed_symbols": ["ETHUSDT"], "minimum_notional": "750"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let expected = FilterConfig::allow_all()
        .with_symbols(["ETHUSDT"])
        .with_minimum_notional(Decimal::from(750));
    assert_eq!(*server.filter.snapshot(), expected);
    assert!(!server.filter.accept(&sample_event()));
}

#[tokio::test]
async fn rejects_malformed_filter() {
    let server = start_server(&[]).await;
    let response = reqwest::Client::new()
        .put(format!("http://{}/filter", server.base))
        .header("content-type", "application/json")
        .body(r#"{"minimum_notional": "lots"}"#)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(*server.filter.snapshot(), FilterConfig::allow_all());
}

#[tokio::test]
async fn dashboard_socket_receives_published_events() {
    let server = start_server(&[]).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.base))
        .await
        .unwrap();

    timeout(WAIT, async {
        while server.broadcaster.consumer_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(server.broadcaster.publish(&sample_event()), 1);

    let message = timeout(WAIT, socket.next()).await.unwrap().unwrap().unwrap();
    let Message::Text(text) = message else {
        panic!("expected text frame, got {message:?}");
    };
    let frame: Value = serde_json::from_str(text.as_str()).unwrap();
    assert_eq!(frame["event"], "liquidation_update");
    assert_eq!(frame["data"]["Symbol"], "BTCUSDT");
    assert_eq!(frame["data"]["Side"], "Sell");
    assert_eq!(frame["data"]["Total($)"], 500.0);
    assert_eq!(frame["data"]["Trade Time"], "2023-11-15 07:13:20");
    assert_eq!(frame["data"]["Source"], "Binance");

    drop(socket);
    timeout(WAIT, async {
        while server.broadcaster.consumer_count() != 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn dashboard_socket_closes_on_broadcaster_shutdown() {
    let server = start_server(&[]).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.base))
        .await
        .unwrap();

    timeout(WAIT, async {
        while server.broadcaster.consumer_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    server.broadcaster.shutdown();

    let closed = timeout(WAIT, async {
        loop {
            match socket.next().await {
                Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok());
}
