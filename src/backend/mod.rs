pub mod sagemaker;

use async_trait::async_trait;
use thiserror::Error;

use crate::relay::{BackendPayload, BackendResult};

pub use sagemaker::SageMakerBackend;

#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed backend response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Transport(e.to_string())
    }
}

/// One synchronous generation call against the hosting backend.
/// Implementations never retry.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn invoke(&self, payload: &BackendPayload) -> Result<BackendResult, BackendError>;

    fn endpoint_name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    pub struct FakeBackend {
        reply: Result<serde_json::Value, BackendError>,
        calls: Mutex<Vec<BackendPayload>>,
    }

    impl FakeBackend {
        pub fn replying(value: serde_json::Value) -> Self {
            Self {
                reply: Ok(value),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(err: BackendError) -> Self {
            Self {
                reply: Err(err),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<BackendPayload> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl InferenceBackend for FakeBackend {
        async fn invoke(&self, payload: &BackendPayload) -> Result<BackendResult, BackendError> {
            self.calls.lock().unwrap().push(payload.clone());
            match &self.reply {
                Ok(value) => serde_json::from_value(value.clone())
                    .map_err(|e| BackendError::Decode(e.to_string())),
                Err(e) => Err(e.clone()),
            }
        }

        fn endpoint_name(&self) -> &str {
            "fake-endpoint"
        }
    }
}
