//! Telemetry and tracing utilities
//!
//! Installs a `tracing-subscriber` fmt layer for the CLI and for embedders that
//! do not bring their own subscriber.
//!
//! ```rust,ignore
//! use medexplain::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! init_subscriber(SubscriberConfig::default().with_output_format(OutputFormat::Json))?;
//! ```

use tracing_subscriber::EnvFilter;

use crate::error::PipelineError;

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// One JSON object per event
    Json,
    /// Single-line text
    Compact,
}

impl std::str::FromStr for OutputFormat {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            other => Err(PipelineError::Config(format!(
                "Invalid log format: {other}. Valid options: text, json, compact"
            ))),
        }
    }
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub log_level: tracing::Level,
    pub output_format: OutputFormat,
    /// Let `RUST_LOG` override the crate-level filter
    pub respect_rust_log: bool,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
            respect_rust_log: true,
        }
    }
}

impl SubscriberConfig {
    /// Debug-level preset used by `--verbose`.
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            ..Self::default()
        }
    }

    /// Set the output format
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    fn filter(&self) -> EnvFilter {
        if self.respect_rust_log
            && let Ok(filter) = EnvFilter::try_from_default_env()
        {
            return filter;
        }
        let level = self.log_level.as_str().to_lowercase();
        EnvFilter::new(format!("medexplain={level}"))
    }
}

/// Install the global subscriber. Succeeds quietly if one is already set.
pub fn init_subscriber(config: SubscriberConfig) -> Result<(), PipelineError> {
    let filter = config.filter();
    let init_result = match config.output_format {
        OutputFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init(),
        OutputFormat::Compact => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .try_init(),
        OutputFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };

    match init_result {
        Ok(()) => Ok(()),
        Err(e) if e.to_string().contains("already") => Ok(()),
        Err(e) => Err(PipelineError::Config(format!(
            "Failed to initialize tracing: {e}"
        ))),
    }
}
