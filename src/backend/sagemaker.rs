use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;

use super::{BackendError, InferenceBackend};
use crate::config::BackendSettings;
use crate::error::RelayError;
use crate::http_client::client_for_url;
use crate::relay::{BackendPayload, BackendResult};

/// Posts payloads to `/endpoints/{name}/invocations` of a SageMaker-style
/// runtime, or any URL speaking the text-generation-inference JSON shape.
pub struct SageMakerBackend {
    client: reqwest::Client,
    endpoint_name: String,
    invocation_url: String,
    auth_token: Option<String>,
}

impl SageMakerBackend {
    pub fn from_settings(settings: &BackendSettings, endpoint_name: &str) -> Result<Self, RelayError> {
        let invocation_url = settings.invocation_url(endpoint_name);
        let client = client_for_url(
            &invocation_url,
            settings.timeout_secs.map(Duration::from_secs),
        )
        .map_err(|e| RelayError::Config(format!("failed to build backend client: {}", e)))?;

        Ok(Self {
            client,
            endpoint_name: endpoint_name.to_string(),
            invocation_url,
            auth_token: settings
                .auth_token
                .clone()
                .filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn invocation_url(&self) -> &str {
        &self.invocation_url
    }
}

#[async_trait]
impl InferenceBackend for SageMakerBackend {
    async fn invoke(&self, payload: &BackendPayload) -> Result<BackendResult, BackendError> {
        let mut builder = self
            .client
            .post(&self.invocation_url)
            .header(ACCEPT, "application/json")
            .json(payload);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        serde_json::from_slice::<BackendResult>(&bytes)
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn endpoint_name(&self) -> &str {
        &self.endpoint_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::translator::{decode, to_backend_payload};
    use crate::relay::RequestBody;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Seen {
        bodies: Mutex<Vec<Value>>,
        auth: Mutex<Vec<Option<String>>>,
    }

    /// Serves `reply` on the invocation route and records what it received.
    async fn spawn_backend(status: StatusCode, reply: &'static str) -> (String, Arc<Seen>) {
        let seen = Arc::new(Seen::default());
        let seen_route = seen.clone();
        let app = Router::new().route(
            "/endpoints/{name}/invocations",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let seen = seen_route.clone();
                async move {
                    seen.bodies.lock().unwrap().push(body);
                    seen.auth.lock().unwrap().push(
                        headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string()),
                    );
                    (status, reply)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), seen)
    }

    fn settings(base_url: String) -> BackendSettings {
        BackendSettings {
            base_url,
            ..Default::default()
        }
    }

    fn payload() -> BackendPayload {
        let req = decode(RequestBody::Structured(json!({"prompt": "ping"}))).unwrap();
        to_backend_payload(&req)
    }

    #[test]
    fn invocation_url_is_built_from_settings() {
        let backend =
            SageMakerBackend::from_settings(&settings("http://127.0.0.1:9".into()), "ep").unwrap();
        assert_eq!(
            backend.invocation_url(),
            "http://127.0.0.1:9/endpoints/ep/invocations"
        );
        assert_eq!(backend.endpoint_name(), "ep");
    }

    #[tokio::test]
    async fn posts_payload_and_decodes_sequence() {
        let (url, seen) = spawn_backend(StatusCode::OK, r#"[{"generated_text": "pong"}]"#).await;
        let mut s = settings(url);
        s.auth_token = Some("secret".into());
        let backend = SageMakerBackend::from_settings(&s, "ep").unwrap();

        let result = backend.invoke(&payload()).await.unwrap();
        assert_eq!(
            result,
            BackendResult::Sequence(vec![json!({"generated_text": "pong"})])
        );

        let bodies = seen.bodies.lock().unwrap().clone();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["parameters"]["return_full_text"], false);
        assert!(bodies[0]["inputs"].as_str().unwrap().contains("ping"));
        assert_eq!(
            seen.auth.lock().unwrap()[0].as_deref(),
            Some("Bearer secret")
        );
    }

    #[tokio::test]
    async fn non_success_status_is_surfaced_once() {
        let (url, seen) = spawn_backend(StatusCode::SERVICE_UNAVAILABLE, "model loading").await;
        let backend = SageMakerBackend::from_settings(&settings(url), "ep").unwrap();

        let err = backend.invoke(&payload()).await.unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "model loading");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // no retries
        assert_eq!(seen.bodies.lock().unwrap().len(), 1);
        assert_eq!(seen.auth.lock().unwrap()[0], None);
    }

    #[tokio::test]
    async fn undecodable_body_is_a_decode_error() {
        let (url, _seen) = spawn_backend(StatusCode::OK, "not json").await;
        let backend = SageMakerBackend::from_settings(&settings(url), "ep").unwrap();

        let err = backend.invoke(&payload()).await.unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend =
            SageMakerBackend::from_settings(&settings(format!("http://{}", addr)), "ep").unwrap();
        let err = backend.invoke(&payload()).await.unwrap_err();
        assert!(matches!(err, BackendError::Transport(_)));
    }
}
