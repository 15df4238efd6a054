//! Image re-encoding for transport.
//!
//! Uploads are always decoded and re-encoded, never passed through, because
//! providers differ in the MIME types they accept.

pub mod mime;

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;

use crate::error::PipelineError;
use crate::types::{ImageFormat, UploadedImage};

/// Default JPEG quality used for transport
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Deterministic, I/O-free image transcoder.
#[derive(Debug, Clone, Copy)]
pub struct ImageEncoder {
    jpeg_quality: u8,
}

impl Default for ImageEncoder {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ImageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// JPEG quality, clamped to 1..=100.
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Decode the upload and re-encode it as `target`.
    pub fn encode(
        &self,
        image: &UploadedImage,
        target: ImageFormat,
    ) -> Result<Vec<u8>, PipelineError> {
        let decoded = decode(image)?;
        let mut out = Vec::with_capacity(image.len());
        match target {
            ImageFormat::Png => {
                decoded.write_to(&mut Cursor::new(&mut out), target.as_image_format())?;
            }
            ImageFormat::Jpeg => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(decoded.to_rgb8());
                rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, self.jpeg_quality))?;
            }
        }
        tracing::debug!(
            source = ?image.format(),
            target = ?target,
            width = decoded.width(),
            height = decoded.height(),
            bytes = out.len(),
            "re-encoded image"
        );
        Ok(out)
    }

    /// `data:<mime>;base64,<payload>`
    pub fn to_base64_data_url(&self, bytes: &[u8], mime_type: &str) -> String {
        format!("data:{mime_type};base64,{}", STANDARD.encode(bytes))
    }
}

fn decode(image: &UploadedImage) -> Result<DynamicImage, PipelineError> {
    image::load_from_memory_with_format(image.bytes(), image.format().as_image_format())
        .map_err(|e| {
            PipelineError::Encoding(format!("cannot decode {:?} upload: {e}", image.format()))
        })
}
