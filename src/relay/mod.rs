pub mod translator;
pub mod types;

use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::backend::InferenceBackend;
use crate::error::RelayError;

pub use types::{BackendPayload, BackendResult, OutboundResponse, RequestBody};

/// Progress of a single invocation. Nothing survives the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    Received,
    Decoded,
    Invoked,
    Responded,
    ValidationFailed,
    BackendFailed,
}

impl RelayStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RelayStage::Responded | RelayStage::ValidationFailed | RelayStage::BackendFailed
        )
    }
}

/// Bridges one HTTP request to the hosting backend.
pub struct Relay {
    backend: Arc<dyn InferenceBackend>,
}

impl Relay {
    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }

    /// Always produces exactly one response; failures become 400 or 500.
    pub async fn handle(&self, raw: RequestBody) -> OutboundResponse {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "relay",
            %request_id,
            endpoint = %self.backend.endpoint_name()
        );
        async move {
            let (stage, response) = self.process(raw).await;
            debug_assert!(stage.is_terminal());
            tracing::info!(
                stage = ?stage,
                status = response.status.as_u16(),
                "invocation finished"
            );
            response
        }
        .instrument(span)
        .await
    }

    pub(crate) async fn process(&self, raw: RequestBody) -> (RelayStage, OutboundResponse) {
        tracing::debug!(stage = ?RelayStage::Received);
        let request = match translator::decode(raw) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Rejected request: {}", e);
                return (RelayStage::ValidationFailed, OutboundResponse::from_error(&e));
            }
        };
        tracing::debug!(stage = ?RelayStage::Decoded);

        let payload = translator::to_backend_payload(&request);
        tracing::debug!(
            payload = %serde_json::to_string(&payload).unwrap_or_default(),
            "invoking backend"
        );

        let result = match self.backend.invoke(&payload).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error invoking SageMaker endpoint: {}", e);
                let err = RelayError::Backend(e);
                return (RelayStage::BackendFailed, OutboundResponse::from_error(&err));
            }
        };
        tracing::debug!(
            stage = ?RelayStage::Invoked,
            result = %serde_json::to_string(&result).unwrap_or_default(),
            "backend responded"
        );

        match translator::from_backend_result(result, &request) {
            Ok(response) => (RelayStage::Responded, response),
            Err(e) => {
                tracing::error!("Unusable SageMaker response: {}", e);
                let err = RelayError::Backend(e);
                (RelayStage::BackendFailed, OutboundResponse::from_error(&err))
            }
        }
    }
}
