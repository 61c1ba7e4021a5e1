use serde_json::{Map, Value, json};

use super::types::{
    BackendParameters, BackendPayload, BackendResult, GenerationParameters, GenerationRequest,
    OutboundResponse, RequestBody,
};
use crate::backend::BackendError;
use crate::error::{RelayError, Result};

pub const SYSTEM_PREAMBLE: &str = "You are a helpful AI assistant.";
pub const END_OF_TURN: &str = "</s>";
pub const STOP_SEQUENCES: [&str; 3] = ["</s>", "<|user|>", "<|system|>"];
pub const MISSING_PROMPT: &str = "Missing 'prompt' in request body";

pub fn decode(raw: RequestBody) -> Result<GenerationRequest> {
    let body = match raw {
        RequestBody::Text(text) => serde_json::from_str::<Value>(&text)?,
        RequestBody::Structured(value) => value,
        RequestBody::Empty => Value::Object(Map::new()),
    };

    let prompt = body
        .get("prompt")
        .and_then(Value::as_str)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RelayError::Validation(MISSING_PROMPT.to_string()))?;

    let parameters =
        GenerationParameters::from_json(body.get("parameters").and_then(Value::as_object));

    Ok(GenerationRequest {
        prompt: prompt.to_string(),
        parameters,
    })
}

/// Chat template expected by TinyLlama-style chat models:
/// system, user, then an open assistant turn.
pub fn format_prompt(prompt: &str) -> String {
    format!(
        "<|system|>\n{SYSTEM_PREAMBLE}{END_OF_TURN}\n<|user|>\n{prompt}{END_OF_TURN}\n<|assistant|>\n"
    )
}

pub fn backend_parameters(params: &GenerationParameters) -> BackendParameters {
    BackendParameters {
        generation: *params,
        // only the generated tokens, not the prompt
        return_full_text: false,
        stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
    }
}

pub fn to_backend_payload(req: &GenerationRequest) -> BackendPayload {
    BackendPayload {
        inputs: format_prompt(req.prompt()),
        parameters: backend_parameters(req.parameters()),
    }
}

/// A list must lead with an object; only a missing `generated_text` inside
/// that object falls back to `""`.
pub fn extract_generated_text(
    result: &BackendResult,
) -> std::result::Result<String, BackendError> {
    match result {
        BackendResult::Sequence(items) => {
            let first = items
                .first()
                .ok_or_else(|| BackendError::Decode("empty generation list".to_string()))?;
            let obj = first.as_object().ok_or_else(|| {
                BackendError::Decode(format!("expected a generation object, got {}", first))
            })?;
            Ok(obj
                .get("generated_text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string())
        }
        BackendResult::Single(obj) => match obj.get("generated_text").and_then(Value::as_str) {
            Some(text) => Ok(text.to_string()),
            None => Ok(Value::Object(obj.clone()).to_string()),
        },
    }
}

pub fn from_backend_result(
    result: BackendResult,
    req: &GenerationRequest,
) -> std::result::Result<OutboundResponse, BackendError> {
    let generated_text = extract_generated_text(&result)?;
    Ok(OutboundResponse::ok(json!({
        "generated_text": generated_text,
        "prompt": req.prompt(),
        "parameters": backend_parameters(req.parameters()),
    })))
}
