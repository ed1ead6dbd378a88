//! Control-plane route tests.
//!
//! The fetcher group is empty here, so the fan-out succeeds trivially and
//! the tests exercise routing, parsing, and error mapping.

use std::sync::Arc;

use tickerflow_aggregator::Aggregator;
use tickerflow_api::{create_router, ApiState};
use tickerflow_exchange::FetcherGroup;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

struct TestServer {
    base_url: String,
    // Keeps the aggregator's command receiver alive.
    _aggregator: Aggregator,
}

async fn start_server() -> TestServer {
    let (_inbox_tx, inbox_rx) = mpsc::channel(8);
    let (sink_tx, _sink_rx) = mpsc::channel(8);
    let (aggregator, handle) = Aggregator::new(inbox_rx, sink_tx, CancellationToken::new());

    let state = ApiState::new(Arc::new(FetcherGroup::from_adapters(Vec::new())), handle);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        _aggregator: aggregator,
    }
}

#[tokio::test]
async fn test_subscribe_known_pair() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/ticker/BTC/USD/subscribe", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "subscription to BTCUSD done");
}

#[tokio::test]
async fn test_unsubscribe_known_pair() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/ticker/ETH/EUR/unsubscribe", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "subscription to ETHEUR done");
}

#[tokio::test]
async fn test_unknown_pair_is_bad_request() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/ticker/LTC/GBP/subscribe", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_unknown_action_is_bad_request() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/ticker/BTC/USD/resubscribe", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_timer_accepts_menu_token() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/timer/1H", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Time set on 1H");
}

#[tokio::test]
async fn test_timer_rejects_unknown_token() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/timer/7m", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_openapi_document_served() {
    let server = start_server().await;

    let response = reqwest::get(format!("{}/openapi.json", server.base_url))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["paths"]["/ticker/{base}/{target}/{action}"].is_object());
    assert!(body["paths"]["/timer/{new}"].is_object());
}
