//! Control-plane error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tickerflow_core::CoreError;
use tickerflow_exchange::ExchangeError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Upstream(String),
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotValid | CoreError::UnsupportedInterval(_) => {
                Self::BadRequest(e.to_string())
            }
            CoreError::NotFound(_, _) => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<ExchangeError> for ApiError {
    fn from(e: ExchangeError) -> Self {
        match e {
            ExchangeError::SubscriptionNotFound { .. } => Self::NotFound(e.to_string()),
            ExchangeError::Decode(_) | ExchangeError::Unsupported(_) => {
                Self::BadRequest(e.to_string())
            }
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
