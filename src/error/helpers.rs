//! User-facing error helper utilities.
//!
//! Structured summaries suitable for CLI/UI rendering. The category tells the
//! user which external dependency is at fault.

use super::types::{ErrorKind, PipelineError};

/// Coarse grouping shown to users
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    /// The image hosting service rejected or lost the upload
    Upload,
    /// The image could not be processed or the inference provider failed
    Analysis,
    /// Keys, models or the instruction are missing or invalid
    Configuration,
    /// The user aborted the run
    Cancelled,
}

impl FailureCategory {
    pub fn from_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::UploadError => Self::Upload,
            ErrorKind::ConfigError => Self::Configuration,
            ErrorKind::Cancelled => Self::Cancelled,
            ErrorKind::EncodingError
            | ErrorKind::ProviderError
            | ErrorKind::TransportError
            | ErrorKind::UnrecognizedResponseShape => Self::Analysis,
        }
    }

    /// Short headline for the category.
    pub fn headline(&self) -> &'static str {
        match self {
            Self::Upload => "Upload failed",
            Self::Analysis => "Analysis failed",
            Self::Configuration => "Misconfiguration",
            Self::Cancelled => "Analysis cancelled",
        }
    }
}

/// Structured error summary for CLI/UI consumption
#[derive(Debug, Clone)]
pub struct ErrorSummary {
    pub category: FailureCategory,
    pub kind: ErrorKind,
    pub status: Option<u16>,
    pub message: String,
    pub suggestions: Vec<String>,
}

impl ErrorSummary {
    /// One-line rendering: `"<headline>: <message>"`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.category.headline(), self.message)
    }
}

/// Summarize a failure given its kind and detail.
pub fn summarize_failure(kind: ErrorKind, detail: &str) -> ErrorSummary {
    ErrorSummary {
        category: FailureCategory::from_kind(kind),
        kind,
        status: None,
        message: detail.to_string(),
        suggestions: suggest_fixes(kind),
    }
}

/// Summarize a `PipelineError` with friendly suggestions.
pub fn summarize_error(err: &PipelineError) -> ErrorSummary {
    let mut summary = summarize_failure(err.kind(), &err.detail());
    summary.status = err.status_code();
    if let Some(status) = summary.status {
        match status {
            401 | 403 => summary
                .suggestions
                .insert(0, "Check the inference API key".to_string()),
            429 => summary
                .suggestions
                .insert(0, "The provider is rate limiting requests; wait and resubmit".to_string()),
            _ => {}
        }
    }
    summary
}

fn suggest_fixes(kind: ErrorKind) -> Vec<String> {
    let tips: &[&str] = match kind {
        ErrorKind::EncodingError => &["Upload a PNG or JPEG image"],
        ErrorKind::UploadError => &[
            "Check the image hosting API key and quota",
            "Switch to inline delivery to bypass the image host",
        ],
        ErrorKind::ConfigError => &["Set the required API keys and model before starting"],
        ErrorKind::ProviderError => &["Verify the model name supports image input"],
        ErrorKind::TransportError => &["Check network connectivity and resubmit"],
        ErrorKind::UnrecognizedResponseShape => {
            &["The endpoint may not be chat-completions compatible; check the base URL"]
        }
        ErrorKind::Cancelled => &[],
    };
    tips.iter().map(|s| s.to_string()).collect()
}
