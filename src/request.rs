//! Provider-specific request construction.
//!
//! The builder is pure: it validates its inputs and selects the payload shape,
//! nothing else. Rendering to the wire format happens in `InferenceRequest::to_body`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::{DEFAULT_MAX_TOKENS, ProviderConfig};
use crate::error::PipelineError;
use crate::types::ImageReference;

/// Payload layout expected by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PayloadShape {
    /// OpenAI-style chat message carrying `text` and `image_url` content blocks
    #[default]
    MultimodalContent,
    /// Text-only model: the image reference is pasted into the instruction.
    /// The model sees a string, not an image.
    TextEmbedded,
    /// Single text message plus a top-level `image` field
    SimplifiedEndpoint,
}

impl std::str::FromStr for PayloadShape {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multimodal" | "multimodal-content" => Ok(Self::MultimodalContent),
            "text-embedded" | "text" => Ok(Self::TextEmbedded),
            "simplified" | "simplified-endpoint" => Ok(Self::SimplifiedEndpoint),
            other => Err(PipelineError::Config(format!("unknown payload shape '{other}'"))),
        }
    }
}

/// Name of the token limit field in the request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TokenLimitField {
    #[default]
    MaxTokens,
    MaxCompletionTokens,
}

impl TokenLimitField {
    pub fn key(&self) -> &'static str {
        match self {
            Self::MaxTokens => "max_tokens",
            Self::MaxCompletionTokens => "max_completion_tokens",
        }
    }
}

/// Sampling and delivery tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    pub stream: bool,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            top_p: None,
            stream: false,
        }
    }
}

impl InferenceParams {
    /// Sampling temperature, 0.0 to 2.0.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Upper bound on generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Nucleus sampling mass, 0.0 to 1.0.
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Request an SSE stream instead of one JSON body.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(PipelineError::Config(format!(
                "temperature {t} is outside 0.0..=2.0"
            )));
        }
        if let Some(p) = self.top_p
            && !(0.0..=1.0).contains(&p)
        {
            return Err(PipelineError::Config(format!("top_p {p} is outside 0.0..=1.0")));
        }
        if self.max_tokens == Some(0) {
            return Err(PipelineError::Config("max_tokens must be positive".to_string()));
        }
        Ok(())
    }
}

/// A fully specified, immutable inference call.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceRequest {
    provider_id: String,
    model: String,
    shape: PayloadShape,
    token_limit_field: TokenLimitField,
    instruction: String,
    image: ImageReference,
    params: InferenceParams,
}

impl InferenceRequest {
    pub fn builder() -> InferenceRequestBuilder {
        InferenceRequestBuilder::default()
    }

    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn shape(&self) -> PayloadShape {
        self.shape
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }

    pub fn image(&self) -> &ImageReference {
        &self.image
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    pub fn is_streaming(&self) -> bool {
        self.params.stream
    }

    /// Render the JSON body for the configured shape.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), json!(self.model));

        let message = match self.shape {
            PayloadShape::MultimodalContent => json!({
                "role": "user",
                "content": [
                    { "type": "text", "text": self.instruction },
                    { "type": "image_url", "image_url": { "url": self.image.as_url() } }
                ]
            }),
            PayloadShape::TextEmbedded => json!({
                "role": "user",
                "content": format!("{}\n\nImage: {}", self.instruction, self.image.as_url())
            }),
            PayloadShape::SimplifiedEndpoint => json!({
                "role": "user",
                "content": self.instruction
            }),
        };
        body.insert("messages".to_string(), Value::Array(vec![message]));

        if self.shape == PayloadShape::SimplifiedEndpoint {
            body.insert("image".to_string(), json!(self.image.raw_payload()));
        }

        if let Some(max_tokens) = self.params.max_tokens {
            body.insert(self.token_limit_field.key().to_string(), json!(max_tokens));
        }
        if let Some(temperature) = self.params.temperature {
            body.insert("temperature".to_string(), json!(temperature));
        }
        if let Some(top_p) = self.params.top_p {
            body.insert("top_p".to_string(), json!(top_p));
        }
        body.insert("stream".to_string(), json!(self.params.stream));

        Value::Object(body)
    }
}

/// Builder for `InferenceRequest`
#[derive(Debug, Clone, Default)]
pub struct InferenceRequestBuilder {
    provider_id: Option<String>,
    model: Option<String>,
    shape: PayloadShape,
    token_limit_field: TokenLimitField,
    instruction: Option<String>,
    image: Option<ImageReference>,
    params: InferenceParams,
}

impl InferenceRequestBuilder {
    /// Seed provider id, model, shape and token field from provider settings.
    pub fn for_provider(provider: &ProviderConfig) -> Self {
        Self::default()
            .provider(provider.provider_id.clone(), provider.shape)
            .model(provider.model.clone())
            .token_limit_field(provider.token_limit_field)
    }

    pub fn provider(mut self, provider_id: impl Into<String>, shape: PayloadShape) -> Self {
        self.provider_id = Some(provider_id.into());
        self.shape = shape;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn token_limit_field(mut self, field: TokenLimitField) -> Self {
        self.token_limit_field = field;
        self
    }

    pub fn instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = Some(instruction.into());
        self
    }

    pub fn image(mut self, image: ImageReference) -> Self {
        self.image = Some(image);
        self
    }

    pub fn params(mut self, params: InferenceParams) -> Self {
        self.params = params;
        self
    }

    pub fn build(self) -> Result<InferenceRequest, PipelineError> {
        let provider_id = self
            .provider_id
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("no provider configured".to_string()))?;
        let model = self
            .model
            .filter(|m| !m.trim().is_empty())
            .ok_or_else(|| {
                PipelineError::Config(format!("no model configured for provider {provider_id}"))
            })?;
        let instruction = self
            .instruction
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| PipelineError::Config("instruction text is empty".to_string()))?;
        let image = self
            .image
            .ok_or_else(|| PipelineError::Config("no image reference supplied".to_string()))?;
        self.params.validate()?;

        Ok(InferenceRequest {
            provider_id,
            model,
            shape: self.shape,
            token_limit_field: self.token_limit_field,
            instruction,
            image,
            params: self.params,
        })
    }
}

/// One-shot form of the builder.
pub fn build(
    provider: &ProviderConfig,
    instruction: &str,
    image: ImageReference,
    params: InferenceParams,
) -> Result<InferenceRequest, PipelineError> {
    InferenceRequestBuilder::for_provider(provider)
        .instruction(instruction)
        .image(image)
        .params(params)
        .build()
}
