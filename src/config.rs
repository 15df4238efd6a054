//! Process-wide configuration.
//!
//! Loaded once at startup and shared read-only. Components receive the part
//! they need at construction; nothing else reads the environment.

use secrecy::{ExposeSecret, SecretString};

use crate::error::PipelineError;
use crate::request::{InferenceParams, PayloadShape, TokenLimitField};
use crate::types::{DeliveryMode, HttpConfig, ImageFormat};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-1.5-flash";
pub const DEFAULT_PROVIDER_ID: &str = "openrouter";
pub const DEFAULT_IMAGE_HOST_URL: &str = "https://api.imgbb.com/1/upload";
pub const DEFAULT_INSTRUCTION: &str = "Explain any abnormalities in this medical image in simple, \
     non-technical terms suitable for patients or students.";
pub const DEFAULT_MAX_TOKENS: u32 = 500;

pub const ENV_INFERENCE_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_BASE_URL: &str = "MEDEXPLAIN_BASE_URL";
pub const ENV_MODEL: &str = "MEDEXPLAIN_MODEL";
pub const ENV_IMAGE_HOST_API_KEY: &str = "IMGBB_API_KEY";
pub const ENV_IMAGE_HOST_URL: &str = "MEDEXPLAIN_IMAGE_HOST_URL";

/// Inference provider settings
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Free-form provider id used in logs
    pub provider_id: String,
    /// Base URL; `/chat/completions` is appended for chat-style shapes
    pub base_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub shape: PayloadShape,
    pub token_limit_field: TokenLimitField,
    pub http_config: HttpConfig,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            provider_id: DEFAULT_PROVIDER_ID.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            model: DEFAULT_MODEL.to_string(),
            shape: PayloadShape::MultimodalContent,
            token_limit_field: TokenLimitField::MaxTokens,
            http_config: HttpConfig::default(),
        }
    }

    /// Chat-completions root, or the full URL of a simplified endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Model identifier sent in every request.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Label used in logs and error summaries.
    pub fn with_provider_id(mut self, id: impl Into<String>) -> Self {
        self.provider_id = id.into();
        self
    }

    /// Payload layout the provider expects.
    pub fn with_shape(mut self, shape: PayloadShape) -> Self {
        self.shape = shape;
        self
    }

    /// Body key that carries the token limit.
    pub fn with_token_limit_field(mut self, field: TokenLimitField) -> Self {
        self.token_limit_field = field;
        self
    }

    /// Timeouts and headers for inference calls.
    pub fn with_http_config(mut self, http_config: HttpConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Full endpoint URL for the configured payload shape.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.shape {
            PayloadShape::MultimodalContent | PayloadShape::TextEmbedded => {
                format!("{base}/chat/completions")
            }
            PayloadShape::SimplifiedEndpoint => base.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "inference API key is missing (set {ENV_INFERENCE_API_KEY})"
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("inference base URL is empty".to_string()));
        }
        check_http_url("inference base URL", &self.base_url)?;
        if self.model.trim().is_empty() {
            return Err(PipelineError::Config("no model configured".to_string()));
        }
        Ok(())
    }
}

/// Image hosting settings, required only for hosted delivery
#[derive(Debug, Clone)]
pub struct ImageHostConfig {
    pub endpoint: String,
    pub api_key: SecretString,
    /// Seconds before the host deletes the image; `None` keeps it
    pub expiration: Option<u32>,
    pub http_config: HttpConfig,
}

impl ImageHostConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_IMAGE_HOST_URL.to_string(),
            api_key: SecretString::from(api_key.into()),
            expiration: None,
            http_config: HttpConfig::for_upload(),
        }
    }

    /// Set the upload endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the auto-delete delay in seconds
    pub fn with_expiration(mut self, seconds: u32) -> Self {
        self.expiration = Some(seconds);
        self
    }

    /// Set HTTP configuration
    pub fn with_http_config(mut self, http_config: HttpConfig) -> Self {
        self.http_config = http_config;
        self
    }

    /// Startup-time validation of key and endpoint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(PipelineError::Config(format!(
                "image host API key is missing (set {ENV_IMAGE_HOST_API_KEY})"
            )));
        }
        if self.endpoint.trim().is_empty() {
            return Err(PipelineError::Config("image host endpoint is empty".to_string()));
        }
        check_http_url("image host endpoint", &self.endpoint)?;
        Ok(())
    }
}

/// Reject URLs reqwest could not send to, before any request is built.
fn check_http_url(what: &str, raw: &str) -> Result<(), PipelineError> {
    let url = reqwest::Url::parse(raw.trim())
        .map_err(|e| PipelineError::Config(format!("{what} '{raw}' is not a valid URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(PipelineError::Config(format!(
            "{what} '{raw}' must use http or https, not {other}"
        ))),
    }
}

/// Everything one deployment needs to run the pipeline
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub provider: ProviderConfig,
    pub image_host: Option<ImageHostConfig>,
    pub delivery_mode: DeliveryMode,
    pub instruction: String,
    pub params: InferenceParams,
    /// Format the upload is re-encoded to before transport
    pub transport_format: ImageFormat,
}

impl AnalysisConfig {
    pub fn new(provider: ProviderConfig) -> Self {
        Self {
            provider,
            image_host: None,
            delivery_mode: DeliveryMode::Inline,
            instruction: DEFAULT_INSTRUCTION.to_string(),
            params: InferenceParams::default(),
            transport_format: ImageFormat::Jpeg,
        }
    }

    /// Enables hosted delivery.
    pub fn with_image_host(mut self, host: ImageHostConfig) -> Self {
        self.image_host = Some(host);
        self
    }

    /// Default delivery mode for runs without an override.
    pub fn with_delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }

    /// Replaces the default instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Sampling parameters for every run.
    pub fn with_params(mut self, params: InferenceParams) -> Self {
        self.params = params;
        self
    }

    /// Format the image is re-encoded to before delivery.
    pub fn with_transport_format(mut self, format: ImageFormat) -> Self {
        self.transport_format = format;
        self
    }

    /// Load from the process environment.
    pub fn from_env(delivery_mode: DeliveryMode) -> Result<Self, PipelineError> {
        Self::from_lookup(delivery_mode, |name| std::env::var(name).ok())
    }

    /// Load through an arbitrary variable lookup.
    pub fn from_lookup<F>(delivery_mode: DeliveryMode, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = get(ENV_INFERENCE_API_KEY).ok_or_else(|| {
            PipelineError::Config(format!("{ENV_INFERENCE_API_KEY} is not set"))
        })?;
        let mut provider = ProviderConfig::new(api_key);
        if let Some(base_url) = get(ENV_BASE_URL) {
            provider = provider.with_base_url(base_url);
        }
        if let Some(model) = get(ENV_MODEL) {
            provider = provider.with_model(model);
        }

        let mut config = Self::new(provider).with_delivery_mode(delivery_mode);

        if let Some(key) = get(ENV_IMAGE_HOST_API_KEY) {
            let mut host = ImageHostConfig::new(key);
            if let Some(url) = get(ENV_IMAGE_HOST_URL) {
                host = host.with_endpoint(url);
            }
            config = config.with_image_host(host);
        }

        config.validate()?;
        Ok(config)
    }

    /// Startup-time validation; a failure here means no run may start.
    pub fn validate(&self) -> Result<(), PipelineError> {
        self.provider.validate()?;
        self.params.validate()?;
        match (&self.delivery_mode, &self.image_host) {
            (DeliveryMode::Hosted, None) => {
                return Err(PipelineError::Config(format!(
                    "hosted delivery requires an image host key (set {ENV_IMAGE_HOST_API_KEY})"
                )));
            }
            (DeliveryMode::Hosted, Some(host)) => host.validate()?,
            (DeliveryMode::Inline, _) => {}
        }
        if self.instruction.trim().is_empty() {
            return Err(PipelineError::Config("instruction text is empty".to_string()));
        }
        Ok(())
    }
}
