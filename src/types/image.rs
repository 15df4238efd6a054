//! Uploaded image types.

use serde::{Deserialize, Serialize};

use crate::encoding::mime::guess_mime_from_bytes;
use crate::error::PipelineError;

/// Transport formats every provider accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    #[default]
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    /// Map a sniffed MIME type to a supported format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            _ => None,
        }
    }

    pub(crate) fn as_image_format(&self) -> ::image::ImageFormat {
        match self {
            Self::Png => ::image::ImageFormat::Png,
            Self::Jpeg => ::image::ImageFormat::Jpeg,
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(PipelineError::Config(format!(
                "unsupported image format '{other}' (expected png or jpeg)"
            ))),
        }
    }
}

/// Raw bytes received from the user, with their sniffed format.
///
/// Owned by exactly one run and never mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadedImage {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl UploadedImage {
    /// Sniff the format from magic numbers; anything other than PNG/JPEG is an encoding error.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, PipelineError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(PipelineError::Encoding("uploaded image is empty".to_string()));
        }
        let mime = guess_mime_from_bytes(&bytes).ok_or_else(|| {
            PipelineError::Encoding("could not detect the image format".to_string())
        })?;
        let format = ImageFormat::from_mime(&mime).ok_or_else(|| {
            PipelineError::Encoding(format!("unsupported upload type {mime}"))
        })?;
        Ok(Self { bytes, format })
    }

    /// Trust a declared format. Decoding still validates the bytes later.
    pub fn with_format(bytes: impl Into<Vec<u8>>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into(),
            format,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for UploadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("format", &self.format)
            .finish()
    }
}
