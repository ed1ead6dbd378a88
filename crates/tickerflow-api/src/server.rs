//! HTTP control plane.
//!
//! Three routes drive the pipeline:
//! - `GET /openapi.json`: the API schema
//! - `GET /ticker/:base/:target/:action`: subscribe/unsubscribe a pair
//! - `GET /timer/:new`: replace the aggregator emit interval

use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tickerflow_aggregator::AggregatorHandle;
use tickerflow_core::Interval;
use tickerflow_exchange::{FetcherGroup, SubscriptionAction};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state for the control-plane handlers.
#[derive(Clone)]
pub struct ApiState {
    group: Arc<FetcherGroup>,
    aggregator: AggregatorHandle,
}

impl ApiState {
    pub fn new(group: Arc<FetcherGroup>, aggregator: AggregatorHandle) -> Self {
        Self { group, aggregator }
    }
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

/// Build the control-plane router.
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/openapi.json", get(openapi))
        .route("/ticker/:base/:target/:action", get(ticker_handler))
        .route("/timer/:new", get(timer_handler))
        .with_state(state)
}

async fn openapi() -> Json<Value> {
    Json(openapi_document())
}

async fn ticker_handler(
    State(state): State<ApiState>,
    Path((base, target, action)): Path<(String, String, String)>,
) -> Result<Json<MessageResponse>, ApiError> {
    let pair = tickerflow_core::find(&base, &target)?;

    let action = match action.as_str() {
        "subscribe" => SubscriptionAction::Subscribe,
        "unsubscribe" => SubscriptionAction::Unsubscribe,
        other => return Err(ApiError::BadRequest(format!("Unknown action: {other}"))),
    };

    let symbol = pair.symbol();
    let errors = state
        .group
        .send_message(action, &[pair], &["ticker".to_string()])
        .await;

    if let Some(first) = errors.into_iter().next() {
        return Err(first.into());
    }

    Ok(Json(MessageResponse {
        message: format!("subscription to {symbol} done"),
    }))
}

async fn timer_handler(
    State(state): State<ApiState>,
    Path(new): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let interval = Interval::from_token(&new)?;

    state
        .aggregator
        .set_interval(interval)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    Ok(Json(MessageResponse {
        message: format!("Time set on {new}"),
    }))
}

/// Serve the control plane until the token is cancelled.
pub async fn serve(
    state: ApiState,
    port: u16,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "Starting control-plane server");
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn openapi_document() -> Value {
    let message_response = json!({
        "type": "object",
        "properties": { "message": { "type": "string" } }
    });

    json!({
        "openapi": "3.0.0",
        "info": {
            "title": "tickerflow",
            "description": "Subscribes to exchange ticker feeds, aggregates them per symbol and publishes the volume-weighted result to a Kafka stream.",
            "version": "0.1.0"
        },
        "paths": {
            "/ticker/{base}/{target}/{action}": {
                "get": {
                    "summary": "Subscribe or unsubscribe a currency pair on every exchange",
                    "parameters": [
                        { "name": "base", "in": "path", "required": true, "schema": { "type": "string" } },
                        { "name": "target", "in": "path", "required": true, "schema": { "type": "string" } },
                        { "name": "action", "in": "path", "required": true, "schema": { "type": "string", "enum": ["subscribe", "unsubscribe"] } }
                    ],
                    "responses": {
                        "200": { "description": "Command fanned out", "content": { "application/json": { "schema": message_response } } },
                        "400": { "description": "Unknown pair or action" }
                    }
                }
            },
            "/timer/{new}": {
                "get": {
                    "summary": "Replace the aggregator emit interval",
                    "parameters": [
                        { "name": "new", "in": "path", "required": true, "schema": { "type": "string", "enum": ["1m", "3m", "5m", "15m", "30m", "45m", "1H", "2H", "3H", "4H", "1D", "1W", "1M"] } }
                    ],
                    "responses": {
                        "200": { "description": "Interval replaced", "content": { "application/json": { "schema": message_response } } },
                        "400": { "description": "Unknown interval token" }
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_lists_routes() {
        let doc = openapi_document();
        assert!(doc["paths"]["/ticker/{base}/{target}/{action}"].is_object());
        assert!(doc["paths"]["/timer/{new}"].is_object());
        assert_eq!(doc["info"]["title"], "tickerflow");
    }
}
