//! Type Conversions for PipelineError
//!
//! `reqwest::Error` is deliberately absent: whether a network failure is an
//! upload error or a transport error depends on the call site.

use super::types::PipelineError;

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("malformed JSON body: {err}"))
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Encoding(err.to_string())
    }
}
