//! Public image hosting.
//!
//! Uploads encoded bytes to an imgbb-style service and returns the public URL.
//! Contract of the service: `POST` multipart `image` field with the API key as
//! the `key` query parameter, answering `{"success": true, "data": {"url": ...}}`.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::Deserialize;

use crate::config::ImageHostConfig;
use crate::error::{PipelineError, truncate_detail};
use crate::http::{build_http_client_from_config, describe_reqwest_error};
use crate::types::ImageFormat;

/// Capability of turning image bytes into a public URL.
#[async_trait]
pub trait ImageHosting: Send + Sync {
    /// Upload once. Failures carry `transient` so the caller can decide on a retry.
    async fn upload(&self, bytes: &[u8], format: ImageFormat) -> Result<String, PipelineError>;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: Option<String>,
}

/// HTTP client for the image host
#[derive(Debug, Clone)]
pub struct ImageHostClient {
    config: ImageHostConfig,
    http_client: reqwest::Client,
}

impl ImageHostClient {
    pub fn new(config: ImageHostConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let http_client = build_http_client_from_config(&config.http_config)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn form(&self, bytes: &[u8], format: ImageFormat) -> Result<Form, PipelineError> {
        let part = Part::bytes(bytes.to_vec())
            .file_name(format!("upload.{}", format.extension()))
            .mime_str(format.mime_type())
            .map_err(|e| PipelineError::upload_permanent(format!("invalid multipart body: {e}")))?;
        let mut form = Form::new().part("image", part);
        if let Some(expiration) = self.config.expiration {
            form = form.text("expiration", expiration.to_string());
        }
        Ok(form)
    }
}

#[async_trait]
impl ImageHosting for ImageHostClient {
    async fn upload(&self, bytes: &[u8], format: ImageFormat) -> Result<String, PipelineError> {
        tracing::debug!(endpoint = %self.config.endpoint, bytes = bytes.len(), "uploading image");

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .query(&[("key", self.config.api_key.expose_secret())])
            .multipart(self.form(bytes, format)?)
            .send()
            .await
            .map_err(|e| PipelineError::upload_transient(describe_reqwest_error(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::upload_transient(describe_reqwest_error(e)))?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "image host rejected upload");
            return Err(PipelineError::upload(status.as_u16(), body));
        }

        parse_upload_response(&body)
    }
}

/// Extract the public URL from a 2xx body.
fn parse_upload_response(body: &str) -> Result<String, PipelineError> {
    let parsed: UploadResponse = serde_json::from_str(body).map_err(|e| {
        PipelineError::upload_permanent(format!(
            "malformed image host response ({e}): {}",
            truncate_detail(body)
        ))
    })?;

    if !parsed.success {
        return Err(PipelineError::upload_permanent(format!(
            "image host reported failure: {}",
            truncate_detail(body)
        )));
    }

    parsed
        .data
        .and_then(|d| d.url)
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| {
            PipelineError::upload_permanent("image host response has no data.url".to_string())
        })
}
