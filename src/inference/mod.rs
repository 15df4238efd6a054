//! Inference invocation.
//!
//! `InferenceClient` talks to a chat-completions style provider in single-shot
//! or streaming mode and reduces every response shape to one explanation string.

pub mod normalize;
pub mod stream;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde_json::Value;

use crate::config::ProviderConfig;
use crate::error::PipelineError;
use crate::http::{build_http_client_from_config, describe_reqwest_error};
use crate::request::InferenceRequest;
use crate::types::InferenceResult;

pub use normalize::{NormalizationRule, RESPONSE_RULES, normalize_response};
pub use stream::{ExplanationStream, collect_explanation, decode_sse};

/// Capability of answering an `InferenceRequest`.
#[async_trait]
pub trait InferenceCapability: Send + Sync {
    /// Single-shot call returning the normalized explanation text.
    async fn chat(&self, request: &InferenceRequest) -> Result<String, PipelineError>;

    /// Streaming call. The returned stream is finite and can be consumed once.
    async fn chat_stream(&self, request: &InferenceRequest)
    -> Result<ExplanationStream, PipelineError>;

    /// Single-shot call folded into the result contract.
    async fn invoke(&self, request: &InferenceRequest) -> InferenceResult {
        self.chat(request).await.into()
    }

    /// Streaming call, drained to completion and folded into the result contract.
    async fn invoke_streaming(&self, request: &InferenceRequest) -> InferenceResult {
        match self.chat_stream(request).await {
            Ok(stream) => collect_explanation(stream, |_| {}).await.into(),
            Err(e) => e.into(),
        }
    }
}

/// HTTP client for a chat-completions style provider
#[derive(Debug, Clone)]
pub struct InferenceClient {
    config: ProviderConfig,
    http_client: reqwest::Client,
}

impl InferenceClient {
    pub fn new(config: ProviderConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let http_client = build_http_client_from_config(&config.http_config)?;
        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn send(
        &self,
        body: &Value,
        streaming: bool,
    ) -> Result<reqwest::Response, PipelineError> {
        let accept = if streaming {
            "text/event-stream"
        } else {
            "application/json"
        };
        let response = self
            .http_client
            .post(self.config.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .header(ACCEPT, accept)
            .json(body)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(describe_reqwest_error(e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!(
                provider = %self.config.provider_id,
                status = status.as_u16(),
                "provider returned an error status"
            );
            return Err(PipelineError::provider(status.as_u16(), text));
        }
        Ok(response)
    }
}

#[async_trait]
impl InferenceCapability for InferenceClient {
    async fn chat(&self, request: &InferenceRequest) -> Result<String, PipelineError> {
        let mut body = request.to_body();
        body["stream"] = Value::Bool(false);

        tracing::debug!(
            provider = %request.provider_id(),
            model = %request.model(),
            shape = ?request.shape(),
            "invoking provider"
        );
        let response = self.send(&body, false).await?;
        let text = response
            .text()
            .await
            .map_err(|e| PipelineError::Transport(describe_reqwest_error(e)))?;
        let json: Value = serde_json::from_str(&text)?;
        normalize_response(&json)
    }

    async fn chat_stream(
        &self,
        request: &InferenceRequest,
    ) -> Result<ExplanationStream, PipelineError> {
        let mut body = request.to_body();
        body["stream"] = Value::Bool(true);

        tracing::debug!(
            provider = %request.provider_id(),
            model = %request.model(),
            shape = ?request.shape(),
            "opening provider stream"
        );
        let response = self.send(&body, true).await?;

        // Some endpoints ignore `stream` and answer with a plain JSON body
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        if is_json {
            tracing::debug!("provider answered a stream request with a JSON body");
            let text = response
                .text()
                .await
                .map_err(|e| PipelineError::Transport(describe_reqwest_error(e)))?;
            let json: Value = serde_json::from_str(&text)?;
            return Ok(stream::single_chunk(normalize_response(&json)?));
        }

        Ok(decode_sse(response.bytes_stream()))
    }
}
