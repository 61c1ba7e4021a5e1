use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::backend::BackendError;

/// Fixed `error` field returned whenever the hosting backend call fails.
pub const BACKEND_FAILURE_MESSAGE: &str = "Failed to invoke SageMaker endpoint";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid JSON in request body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Forbidden")]
    Unauthorized,

    #[error("Too Many Requests")]
    Throttled,

    #[error("Limit Exceeded")]
    QuotaExceeded,

    #[error("Config error: {0}")]
    Config(String),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) | RelayError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            RelayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            RelayError::Unauthorized => StatusCode::FORBIDDEN,
            RelayError::Throttled | RelayError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            RelayError::Backend(_)
            | RelayError::Config(_)
            | RelayError::Toml(_)
            | RelayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body shown to callers. Internal details other than the backend
    /// message are never exposed.
    pub fn body(&self) -> serde_json::Value {
        match self {
            RelayError::Backend(e) => json!({
                "error": BACKEND_FAILURE_MESSAGE,
                "message": e.to_string(),
            }),
            RelayError::Config(_) | RelayError::Toml(_) | RelayError::Io(_) => {
                json!({ "error": "Internal server error" })
            }
            other => json!({ "error": other.to_string() }),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
