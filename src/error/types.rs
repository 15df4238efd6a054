//! Core error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of bytes of a raw provider body kept in error details.
pub const MAX_DETAIL_BYTES: usize = 512;

/// Discriminant of a pipeline failure, carried by `InferenceResult::Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    EncodingError,
    UploadError,
    ConfigError,
    ProviderError,
    TransportError,
    UnrecognizedResponseShape,
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EncodingError => "encoding error",
            Self::UploadError => "upload error",
            Self::ConfigError => "configuration error",
            Self::ProviderError => "provider error",
            Self::TransportError => "transport error",
            Self::UnrecognizedResponseShape => "unrecognized response shape",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Errors produced by the pipeline components.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Source bytes could not be decoded or re-encoded as an image
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Image hosting failed
    #[error("Upload error ({}): {message}", transience(.transient))]
    Upload { transient: bool, message: String },

    /// Missing or invalid configuration / instruction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx status from the inference provider
    #[error("Provider error {status}: {body}")]
    Provider { status: u16, body: String },

    /// Network failure, timeout, malformed body or broken stream
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider returned JSON matching none of the known shapes
    #[error("Unrecognized response shape: {0}")]
    UnrecognizedResponseShape(String),

    /// Caller aborted the run
    #[error("Run cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Build an upload error from an HTTP status: 5xx is transient, anything else is not.
    pub fn upload(status: u16, message: impl Into<String>) -> Self {
        Self::Upload {
            transient: (500..600).contains(&status),
            message: format!("HTTP {status}: {}", truncate_detail(&message.into())),
        }
    }

    /// Upload failure that is worth one more attempt (timeouts, connection drops).
    pub fn upload_transient(message: impl Into<String>) -> Self {
        Self::Upload {
            transient: true,
            message: message.into(),
        }
    }

    /// Upload failure that must not be retried (bad key, quota, malformed body).
    pub fn upload_permanent(message: impl Into<String>) -> Self {
        Self::Upload {
            transient: false,
            message: message.into(),
        }
    }

    /// Non-2xx inference reply. The body is truncated to `MAX_DETAIL_BYTES`.
    pub fn provider(status: u16, body: impl Into<String>) -> Self {
        Self::Provider {
            status,
            body: truncate_detail(&body.into()),
        }
    }

    /// Taxonomy entry reported in `InferenceResult::Failure`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Encoding(_) => ErrorKind::EncodingError,
            Self::Upload { .. } => ErrorKind::UploadError,
            Self::Config(_) => ErrorKind::ConfigError,
            Self::Provider { .. } => ErrorKind::ProviderError,
            Self::Transport(_) => ErrorKind::TransportError,
            Self::UnrecognizedResponseShape(_) => ErrorKind::UnrecognizedResponseShape,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Only transient upload failures are eligible for the single retry.
    /// Inference failures are never retried, whatever their cause.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upload { transient: true, .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable detail without the kind prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Encoding(m)
            | Self::Config(m)
            | Self::Transport(m)
            | Self::UnrecognizedResponseShape(m) => m.clone(),
            Self::Upload { message, .. } => message.clone(),
            Self::Provider { status, body } => format!("HTTP {status}: {body}"),
            Self::Cancelled => "the run was cancelled by the caller".to_string(),
        }
    }
}

fn transience(transient: &bool) -> &'static str {
    if *transient { "transient" } else { "permanent" }
}

/// Cut a raw body down to `MAX_DETAIL_BYTES`, respecting char boundaries.
pub fn truncate_detail(raw: &str) -> String {
    if raw.len() <= MAX_DETAIL_BYTES {
        return raw.to_string();
    }
    let mut end = MAX_DETAIL_BYTES;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &raw[..end])
}
