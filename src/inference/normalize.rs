//! Response normalization rules.
//!
//! Providers answer in different shapes. Each rule is a pure check that either
//! recognizes the shape and yields the explanation text or declines. Rules run
//! in order; when all decline the response is unrecognized.

use serde_json::Value;

use crate::error::{PipelineError, truncate_detail};

/// A pure extractor over a response body.
pub type NormalizationRule = fn(&Value) -> Option<String>;

/// Ordered rules for non-streaming bodies.
pub const RESPONSE_RULES: &[(&str, NormalizationRule)] = &[
    ("output_text", output_text),
    ("choices[0].message.content", first_choice_message),
];

/// Map a non-streaming body to explanation text.
pub fn normalize_response(body: &Value) -> Result<String, PipelineError> {
    for (name, rule) in RESPONSE_RULES {
        if let Some(text) = rule(body) {
            tracing::trace!(rule = name, "response shape recognized");
            return Ok(text);
        }
    }
    Err(PipelineError::UnrecognizedResponseShape(truncate_detail(
        &body.to_string(),
    )))
}

/// Top-level `output_text` string.
pub fn output_text(body: &Value) -> Option<String> {
    body.get("output_text")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `choices[0].message.content`, either a string or an array of text parts.
pub fn first_choice_message(body: &Value) -> Option<String> {
    let content = body
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;
    content_text(content)
}

/// `choices[0].delta.content` of a streaming chunk. Empty deltas yield `None`.
pub fn stream_delta(chunk: &Value) -> Option<String> {
    let content = chunk
        .get("choices")?
        .as_array()?
        .first()?
        .get("delta")?
        .get("content")?;
    content_text(content)
}

/// `choices[0].finish_reason` when the provider set one.
pub fn finish_reason(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .as_array()?
        .first()?
        .get("finish_reason")?
        .as_str()
}

fn content_text(content: &Value) -> Option<String> {
    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<String>(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
