use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;

use crate::error::RelayError;
use crate::relay::{OutboundResponse, RequestBody};
use crate::server::AppState;
use crate::server::auth::{ensure_api_key, mask_key};

/// The body is only looked at once the key is known, so an oversized
/// anonymous request still gets 403.
pub async fn invoke(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<OutboundResponse, RelayError> {
    let api_key = ensure_api_key(&headers, &app_state.config.gateway)?;
    let body = body.map_err(|rejection| {
        tracing::warn!(
            key = %mask_key(&api_key),
            "unreadable request body: {}",
            rejection.body_text()
        );
        body_error(&rejection)
    })?;
    let remaining = app_state.usage_plan.admit(&api_key).inspect_err(|e| {
        tracing::warn!(key = %mask_key(&api_key), "gateway rejected request: {}", e);
    })?;
    tracing::debug!(key = %mask_key(&api_key), remaining, "request admitted");

    Ok(app_state.relay.handle(RequestBody::from_bytes(&body)).await)
}

fn body_error(rejection: &BytesRejection) -> RelayError {
    match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => RelayError::PayloadTooLarge,
        _ => RelayError::Validation(rejection.body_text()),
    }
}
