use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::RelayError;

pub const DEFAULT_MAX_NEW_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_TOP_P: f64 = 0.9;
pub const DEFAULT_DO_SAMPLE: bool = true;

/// Body of one inbound invocation, as received.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Text(String),
    /// Already parsed by whoever delivered the request.
    Structured(Value),
    Empty,
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Structured(value)
    }
}

impl RequestBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.is_empty() {
            RequestBody::Empty
        } else {
            RequestBody::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub max_new_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub do_sample: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            do_sample: DEFAULT_DO_SAMPLE,
        }
    }
}

impl GenerationParameters {
    /// Known keys with the wrong JSON type keep their default.
    pub fn from_json(params: Option<&Map<String, Value>>) -> Self {
        let mut out = Self::default();
        let Some(params) = params else {
            return out;
        };
        if let Some(n) = params.get("max_new_tokens").and_then(token_count) {
            out.max_new_tokens = n;
        }
        if let Some(t) = params.get("temperature").and_then(Value::as_f64) {
            out.temperature = t;
        }
        if let Some(p) = params.get("top_p").and_then(Value::as_f64) {
            out.top_p = p;
        }
        if let Some(s) = params.get("do_sample").and_then(Value::as_bool) {
            out.do_sample = s;
        }
        out
    }
}

/// Whole numbers only; `64.0` counts, `64.5` and negatives do not.
fn token_count(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32)
}

/// A validated generation call. Only `translator::decode` builds one, so
/// the prompt is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub(super) prompt: String,
    pub(super) parameters: GenerationParameters,
}

impl GenerationRequest {
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn parameters(&self) -> &GenerationParameters {
        &self.parameters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendParameters {
    #[serde(flatten)]
    pub generation: GenerationParameters,
    pub return_full_text: bool,
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendPayload {
    pub inputs: String,
    pub parameters: BackendParameters,
}

/// Raw JSON returned by the hosting backend: either a list of generations
/// or a single object. Anything else fails to decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackendResult {
    Sequence(Vec<Value>),
    Single(Map<String, Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutboundResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl OutboundResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn from_error(err: &RelayError) -> Self {
        Self {
            status: err.status_code(),
            body: err.body(),
        }
    }
}

impl IntoResponse for OutboundResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
