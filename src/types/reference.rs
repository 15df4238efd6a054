//! How the image reaches the inference provider.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Delivery mode chosen by configuration, never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Base64 data URI embedded in the request
    #[default]
    Inline,
    /// Public URL obtained from the image host
    Hosted,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline => f.write_str("inline"),
            Self::Hosted => f.write_str("hosted"),
        }
    }
}

impl std::str::FromStr for DeliveryMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "hosted" => Ok(Self::Hosted),
            other => Err(PipelineError::Config(format!(
                "unknown delivery mode '{other}' (expected inline or hosted)"
            ))),
        }
    }
}

/// Exactly one way of pointing at the image.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ImageReference {
    Inline {
        #[serde(rename = "dataUrl")]
        data_url: String,
    },
    Hosted {
        url: String,
    },
}

impl ImageReference {
    pub fn inline(data_url: impl Into<String>) -> Self {
        Self::Inline {
            data_url: data_url.into(),
        }
    }

    pub fn hosted(url: impl Into<String>) -> Self {
        Self::Hosted { url: url.into() }
    }

    /// The string placed in an `image_url.url` field: the data URI or the hosted URL.
    pub fn as_url(&self) -> &str {
        match self {
            Self::Inline { data_url } => data_url,
            Self::Hosted { url } => url,
        }
    }

    /// Bare base64 payload for inline references, the URL for hosted ones.
    pub fn raw_payload(&self) -> &str {
        match self {
            Self::Inline { data_url } => data_url
                .split_once(";base64,")
                .map(|(_, b64)| b64)
                .unwrap_or(data_url),
            Self::Hosted { url } => url,
        }
    }

    pub fn mode(&self) -> DeliveryMode {
        match self {
            Self::Inline { .. } => DeliveryMode::Inline,
            Self::Hosted { .. } => DeliveryMode::Hosted,
        }
    }
}

impl std::fmt::Debug for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline { data_url } => f
                .debug_struct("Inline")
                .field("data_url", &format_args!("<{} chars>", data_url.len()))
                .finish(),
            Self::Hosted { url } => f.debug_struct("Hosted").field("url", url).finish(),
        }
    }
}
