//! Pipeline output types.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, PipelineError, summarize_failure};

/// The sole value a pipeline run hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum InferenceResult {
    Success {
        #[serde(rename = "explanationText")]
        explanation_text: String,
    },
    Failure {
        kind: ErrorKind,
        detail: String,
    },
}

impl InferenceResult {
    pub fn success(explanation_text: impl Into<String>) -> Self {
        Self::Success {
            explanation_text: explanation_text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn explanation(&self) -> Option<&str> {
        match self {
            Self::Success { explanation_text } => Some(explanation_text),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::Success { explanation_text } => explanation_text.clone(),
            Self::Failure { kind, detail } => summarize_failure(*kind, detail).render(),
        }
    }
}

impl From<PipelineError> for InferenceResult {
    fn from(err: PipelineError) -> Self {
        Self::Failure {
            kind: err.kind(),
            detail: err.detail(),
        }
    }
}

impl From<Result<String, PipelineError>> for InferenceResult {
    fn from(res: Result<String, PipelineError>) -> Self {
        match res {
            Ok(text) => Self::success(text),
            Err(e) => e.into(),
        }
    }
}

/// One incremental text fragment of a streamed explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Arrival position, starting at zero
    pub index: usize,
    pub text: String,
}

/// Items produced by a streaming invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Chunk(StreamChunk),
    /// Natural end-of-stream signal from the provider
    End,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_from_error_keeps_kind_and_detail() {
        let res: InferenceResult = PipelineError::Transport("connection reset".into()).into();
        assert_eq!(res.failure_kind(), Some(ErrorKind::TransportError));
        assert_eq!(res.explanation(), None);
        assert_eq!(res.user_message(), "Analysis failed: connection reset");
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(InferenceResult::success("ok")).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["explanationText"], "ok");
    }
}
