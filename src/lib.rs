//! # medexplain
//!
//! A normalized image-analysis request pipeline in front of hosted multimodal
//! chat-completion APIs. A run re-encodes an uploaded image, optionally hosts
//! it to get a public URL, sends one inference request (single-shot or
//! streaming) and reduces whatever the provider answers to a single
//! `InferenceResult`.
//!
#![deny(unsafe_code)]

//! ## Quick Start
//!
//! ```rust,no_run
//! use medexplain::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::from_env(DeliveryMode::Inline)?;
//!     let pipeline = AnalysisPipeline::from_config(config)?;
//!
//!     let image = UploadedImage::new(std::fs::read("scan.png")?)?;
//!     match pipeline.analyze(image).await {
//!         InferenceResult::Success { explanation_text } => println!("{explanation_text}"),
//!         failure => eprintln!("{}", failure.user_message()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The library never reads the environment except through
//! `AnalysisConfig::from_env`, and never writes to disk.

pub mod cancel;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hosting;
pub mod http;
pub mod inference;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod retry;
pub mod telemetry;
pub mod types;

pub use cancel::CancelHandle;
pub use config::{AnalysisConfig, ImageHostConfig, ProviderConfig};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{AnalysisPipeline, PipelineObserver, PipelineState, RunOptions};
pub use types::{DeliveryMode, ImageFormat, ImageReference, InferenceResult, UploadedImage};

/// Common imports
pub mod prelude {
    pub use crate::cancel::CancelHandle;
    pub use crate::config::{AnalysisConfig, ImageHostConfig, ProviderConfig};
    pub use crate::encoding::ImageEncoder;
    pub use crate::error::{ErrorKind, ErrorSummary, FailureCategory, PipelineError};
    pub use crate::hosting::{ImageHostClient, ImageHosting};
    pub use crate::inference::{ExplanationStream, InferenceCapability, InferenceClient};
    pub use crate::pipeline::{
        AnalysisPipeline, NoopObserver, PipelineObserver, PipelineState, RunOptions,
    };
    pub use crate::report::{ExplanationDownload, render_failure};
    pub use crate::request::{
        InferenceParams, InferenceRequest, InferenceRequestBuilder, PayloadShape, TokenLimitField,
    };
    pub use crate::retry::RetryPolicy;
    pub use crate::types::{
        DeliveryMode, HttpConfig, ImageFormat, ImageReference, InferenceResult, StreamChunk,
        StreamEvent, UploadedImage,
    };
}
