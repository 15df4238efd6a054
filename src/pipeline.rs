//! Analysis pipeline (orchestrator)
//!
//! Drives one run through the linear state machine
//!
//! ```text
//! Idle -> Encoding -> (Uploading)? -> Requesting -> (Streaming)? -> Completed | Failed
//! ```
//!
//! `Uploading` happens only for hosted delivery, `Streaming` only for streaming
//! invocations. The first failing stage ends the run. The single exception is a
//! transient upload failure, which gets exactly one more attempt.

use std::sync::Arc;

use tracing::Instrument;

use crate::cancel::CancelHandle;
use crate::config::{AnalysisConfig, ProviderConfig};
use crate::encoding::ImageEncoder;
use crate::error::{ErrorKind, PipelineError};
use crate::hosting::{ImageHostClient, ImageHosting};
use crate::inference::{InferenceCapability, InferenceClient, collect_explanation};
use crate::request::{InferenceParams, InferenceRequestBuilder};
use crate::retry::{RetryExecutor, RetryPolicy, UPLOAD_MAX_ATTEMPTS};
use crate::types::{
    DeliveryMode, ImageFormat, ImageReference, InferenceResult, StreamChunk, UploadedImage,
};

/// Stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Encoding,
    Uploading,
    Requesting,
    Streaming,
    Completed,
    Failed(ErrorKind),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Receives progress of a run. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    fn on_state(&self, _state: PipelineState) {}

    /// Called for every streamed fragment, in arrival order.
    fn on_partial_text(&self, _chunk: &StreamChunk) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Per-run choices made by the caller
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub delivery_mode: DeliveryMode,
    pub instruction: String,
    pub stream: bool,
}

/// Orchestrates encoder, image host and inference client for independent runs.
///
/// Holds only read-only configuration and shared clients, so one pipeline can
/// serve concurrent runs.
pub struct AnalysisPipeline {
    provider: ProviderConfig,
    params: InferenceParams,
    defaults: RunOptions,
    transport_format: ImageFormat,
    encoder: ImageEncoder,
    host: Option<Arc<dyn ImageHosting>>,
    inference: Arc<dyn InferenceCapability>,
    upload_retry: RetryPolicy,
}

impl std::fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("provider_id", &self.provider.provider_id)
            .field("model", &self.provider.model)
            .field("defaults", &self.defaults)
            .field("transport_format", &self.transport_format)
            .field("has_image_host", &self.host.is_some())
            .finish()
    }
}

impl AnalysisPipeline {
    /// Build real HTTP clients from validated configuration.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, PipelineError> {
        config.validate()?;
        let inference: Arc<dyn InferenceCapability> =
            Arc::new(InferenceClient::new(config.provider.clone())?);
        let host = match &config.image_host {
            Some(host) => {
                let client: Arc<dyn ImageHosting> = Arc::new(ImageHostClient::new(host.clone())?);
                Some(client)
            }
            None => None,
        };
        Self::new(config, inference, host)
    }

    /// Assemble from injected components.
    pub fn new(
        config: AnalysisConfig,
        inference: Arc<dyn InferenceCapability>,
        host: Option<Arc<dyn ImageHosting>>,
    ) -> Result<Self, PipelineError> {
        config.provider.validate()?;
        config.params.validate()?;
        if config.delivery_mode == DeliveryMode::Hosted && host.is_none() {
            return Err(PipelineError::Config(
                "hosted delivery requires an image host".to_string(),
            ));
        }
        Ok(Self {
            defaults: RunOptions {
                delivery_mode: config.delivery_mode,
                instruction: config.instruction,
                stream: config.params.stream,
            },
            provider: config.provider,
            params: config.params,
            transport_format: config.transport_format,
            encoder: ImageEncoder::default(),
            host,
            inference,
            upload_retry: RetryPolicy::upload(),
        })
    }

    /// Set the image encoder
    pub fn with_encoder(mut self, encoder: ImageEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    /// Tune the upload backoff. The attempt bound stays at one retry whatever
    /// `policy.max_attempts` says.
    pub fn with_upload_retry(mut self, policy: RetryPolicy) -> Self {
        self.upload_retry = RetryPolicy {
            max_attempts: UPLOAD_MAX_ATTEMPTS,
            ..policy
        };
        self
    }

    /// Run options configured at startup.
    pub fn default_options(&self) -> RunOptions {
        self.defaults.clone()
    }

    /// Run with the configured delivery mode, instruction and streaming flag.
    pub async fn analyze(&self, image: UploadedImage) -> InferenceResult {
        self.run(image, self.default_options()).await
    }

    pub async fn run(&self, image: UploadedImage, options: RunOptions) -> InferenceResult {
        self.run_with(image, options, &CancelHandle::new(), &NoopObserver)
            .await
    }

    /// Full form: cancellable and observable.
    pub async fn run_with(
        &self,
        image: UploadedImage,
        options: RunOptions,
        cancel: &CancelHandle,
        observer: &dyn PipelineObserver,
    ) -> InferenceResult {
        let span = tracing::info_span!(
            "analysis_run",
            run_id = %uuid::Uuid::new_v4(),
            provider = %self.provider.provider_id,
            model = %self.provider.model,
            mode = %options.delivery_mode,
            stream = options.stream,
        );

        async move {
            let mut run = RunState::new(observer);
            match self.drive(image, &options, cancel, &mut run).await {
                Ok(text) => {
                    run.transition(PipelineState::Completed);
                    tracing::info!(chars = text.chars().count(), "analysis completed");
                    InferenceResult::success(text)
                }
                Err(err) => {
                    run.transition(PipelineState::Failed(err.kind()));
                    tracing::warn!(kind = %err.kind(), error = %err, "analysis failed");
                    err.into()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        image: UploadedImage,
        options: &RunOptions,
        cancel: &CancelHandle,
        run: &mut RunState<'_>,
    ) -> Result<String, PipelineError> {
        // Configuration problems surface before any network call
        let template = InferenceRequestBuilder::for_provider(&self.provider)
            .instruction(options.instruction.clone())
            .params(self.params.clone().with_stream(options.stream));
        if options.instruction.trim().is_empty() {
            return Err(PipelineError::Config("instruction text is empty".to_string()));
        }
        let host = match options.delivery_mode {
            DeliveryMode::Hosted => Some(self.host.as_ref().ok_or_else(|| {
                PipelineError::Config("hosted delivery requires an image host".to_string())
            })?),
            DeliveryMode::Inline => None,
        };

        run.transition(PipelineState::Encoding);
        let format = self.transport_format;
        let encoder = self.encoder;
        let encoded = cancel
            .guard(async move {
                tokio::task::spawn_blocking(move || encoder.encode(&image, format))
                    .await
                    .map_err(|e| PipelineError::Encoding(format!("encoder task failed: {e}")))?
            })
            .await?;

        let reference = match host {
            None => {
                let data_url = self.encoder.to_base64_data_url(&encoded, format.mime_type());
                ImageReference::inline(data_url)
            }
            Some(host) => {
                run.transition(PipelineState::Uploading);
                let url = RetryExecutor::new(self.upload_retry.clone())
                    .with_cancel(cancel.clone())
                    .execute(
                        || cancel.guard(host.upload(&encoded, format)),
                        |attempt, err| {
                            tracing::warn!(
                                attempt,
                                error = %err,
                                "transient upload failure, retrying"
                            );
                        },
                    )
                    .await?;
                tracing::info!(%url, "image hosted");
                ImageReference::hosted(url)
            }
        };

        run.transition(PipelineState::Requesting);
        let request = template.image(reference).build()?;

        if !request.is_streaming() {
            return cancel.guard(self.inference.chat(&request)).await;
        }

        let stream = cancel.guard(self.inference.chat_stream(&request)).await?;
        run.transition(PipelineState::Streaming);
        let observer = run.observer;
        cancel
            .guard(collect_explanation(stream, |chunk| {
                observer.on_partial_text(chunk)
            }))
            .await
    }
}

struct RunState<'a> {
    current: PipelineState,
    observer: &'a dyn PipelineObserver,
}

impl<'a> RunState<'a> {
    fn new(observer: &'a dyn PipelineObserver) -> Self {
        observer.on_state(PipelineState::Idle);
        Self {
            current: PipelineState::Idle,
            observer,
        }
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(!self.current.is_terminal(), "transition out of terminal state");
        tracing::debug!(from = ?self.current, to = ?next, "pipeline transition");
        self.current = next;
        self.observer.on_state(next);
    }
}

static_assertions::assert_impl_all!(AnalysisPipeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ExplanationStream;
    use crate::request::InferenceRequest;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn png() -> UploadedImage {
        let img = image::DynamicImage::new_rgb8(4, 3);
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        UploadedImage::new(bytes).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        states: Mutex<Vec<PipelineState>>,
    }

    impl PipelineObserver for Recorder {
        fn on_state(&self, state: PipelineState) {
            self.states.lock().unwrap().push(state);
        }
    }

    struct EchoInference {
        calls: AtomicU32,
        seen: Mutex<Option<InferenceRequest>>,
    }

    impl EchoInference {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl InferenceCapability for EchoInference {
        async fn chat(&self, request: &InferenceRequest) -> Result<String, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = Some(request.clone());
            Ok("explained".to_string())
        }

        async fn chat_stream(
            &self,
            request: &InferenceRequest,
        ) -> Result<ExplanationStream, PipelineError> {
            self.chat(request).await.map(crate::inference::stream::single_chunk)
        }
    }

    struct FlakyHost {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl ImageHosting for FlakyHost {
        async fn upload(
            &self,
            _bytes: &[u8],
            _format: ImageFormat,
        ) -> Result<String, PipelineError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(PipelineError::upload_transient("timed out"))
            } else {
                Ok("https://i.example/scan.jpg".to_string())
            }
        }
    }

    fn pipeline(
        inference: Arc<EchoInference>,
        host: Option<Arc<FlakyHost>>,
    ) -> AnalysisPipeline {
        let config = AnalysisConfig::new(ProviderConfig::new("test-key"));
        AnalysisPipeline::new(config, inference, host.map(|h| h as Arc<dyn ImageHosting>))
            .unwrap()
            .with_upload_retry(RetryPolicy::upload().with_initial_delay(Duration::from_millis(1)))
    }

    fn options(mode: DeliveryMode) -> RunOptions {
        RunOptions {
            delivery_mode: mode,
            instruction: "Explain".to_string(),
            stream: false,
        }
    }

    #[tokio::test]
    async fn inline_run_walks_states_in_order() {
        let inference = Arc::new(EchoInference::new());
        let pipeline = pipeline(inference.clone(), None);
        let recorder = Recorder::default();

        let result = pipeline
            .run_with(png(), options(DeliveryMode::Inline), &CancelHandle::new(), &recorder)
            .await;

        assert_eq!(result, InferenceResult::success("explained"));
        assert_eq!(
            *recorder.states.lock().unwrap(),
            vec![
                PipelineState::Idle,
                PipelineState::Encoding,
                PipelineState::Requesting,
                PipelineState::Completed
            ]
        );
        let seen = inference.seen.lock().unwrap().clone().unwrap();
        assert!(seen.image().as_url().starts_with("data:image/jpeg;base64,"));
    }

    #[tokio::test]
    async fn hosted_run_retries_transient_upload_once() {
        let inference = Arc::new(EchoInference::new());
        let host = Arc::new(FlakyHost {
            calls: AtomicU32::new(0),
            failures: 1,
        });
        let result = pipeline(inference.clone(), Some(host.clone()))
            .run(png(), options(DeliveryMode::Hosted))
            .await;

        assert!(result.is_success());
        assert_eq!(host.calls.load(Ordering::SeqCst), 2);
        let seen = inference.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.image(), &ImageReference::hosted("https://i.example/scan.jpg"));
    }

    #[tokio::test]
    async fn hosted_run_without_host_fails_before_encoding() {
        let inference = Arc::new(EchoInference::new());
        let recorder = Recorder::default();
        let result = pipeline(inference.clone(), None)
            .run_with(png(), options(DeliveryMode::Hosted), &CancelHandle::new(), &recorder)
            .await;

        assert_eq!(result.failure_kind(), Some(ErrorKind::ConfigError));
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            *recorder.states.lock().unwrap(),
            vec![PipelineState::Idle, PipelineState::Failed(ErrorKind::ConfigError)]
        );
    }

    #[tokio::test]
    async fn empty_instruction_is_config_error() {
        let inference = Arc::new(EchoInference::new());
        let mut opts = options(DeliveryMode::Inline);
        opts.instruction = String::new();
        let result = pipeline(inference.clone(), None).run(png(), opts).await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::ConfigError));
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn corrupt_image_fails_in_encoding() {
        let inference = Arc::new(EchoInference::new());
        let bogus = UploadedImage::with_format(vec![0u8; 16], ImageFormat::Png);
        let result = pipeline(inference.clone(), None)
            .run(bogus, options(DeliveryMode::Inline))
            .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::EncodingError));
        assert_eq!(inference.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn hosted_config_without_host_is_rejected_at_construction() {
        let config = AnalysisConfig::new(ProviderConfig::new("k"))
            .with_delivery_mode(DeliveryMode::Hosted);
        let err = AnalysisPipeline::new(config, Arc::new(EchoInference::new()), None).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
