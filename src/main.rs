#![deny(unsafe_code)]

//! `medexplain` command line front end.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use medexplain::prelude::*;
use medexplain::telemetry::{OutputFormat, SubscriberConfig, init_subscriber};

/// Explain a medical image in plain language using a hosted multimodal model.
#[derive(Debug, Parser)]
#[command(name = "medexplain", version, about)]
struct Cli {
    /// PNG or JPEG image to analyze
    image: PathBuf,

    /// How the image reaches the model: inline or hosted
    #[arg(long, default_value = "inline")]
    delivery: DeliveryMode,

    /// Print the explanation as it streams in
    #[arg(long)]
    stream: bool,

    /// Transport encoding: png or jpeg
    #[arg(long, default_value = "jpeg")]
    format: ImageFormat,

    /// Request payload shape: multimodal, text-embedded or simplified
    #[arg(long, default_value = "multimodal")]
    provider_shape: PayloadShape,

    /// Override the instruction sent with the image
    #[arg(long)]
    instruction: Option<String>,

    /// Directory the explanation file is written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Log output: text, json or compact
    #[arg(long, env = "MEDEXPLAIN_LOG_FORMAT", default_value = "text")]
    log_format: OutputFormat,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Prints streamed fragments as they arrive.
struct StreamPrinter;

impl PipelineObserver for StreamPrinter {
    fn on_partial_text(&self, chunk: &StreamChunk) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(chunk.text.as_bytes());
        let _ = out.flush();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = if cli.verbose {
        SubscriberConfig::debug()
    } else {
        SubscriberConfig::default()
    };
    if let Err(e) = init_subscriber(logging.with_output_format(cli.log_format)) {
        eprintln!("{e}");
    }

    let pipeline = match build_pipeline(&cli) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("{}", summarize_startup_error(&e));
            return ExitCode::from(2);
        }
    };

    let image = match tokio::fs::read(&cli.image).await {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("cannot read {}: {e}", cli.image.display());
            return ExitCode::from(2);
        }
    };
    let result = match UploadedImage::new(image) {
        Ok(image) => run(&pipeline, image, cli.stream).await,
        Err(e) => e.into(),
    };

    if let Some(message) = render_failure(&result) {
        eprintln!("{message}");
        return ExitCode::FAILURE;
    }

    if cli.stream {
        println!();
    } else if let Some(text) = result.explanation() {
        println!("{text}");
    }

    if let Some(download) = ExplanationDownload::from_result(&result) {
        match download.write_to_dir(&cli.output_dir).await {
            Ok(path) => eprintln!("saved {}", path.display()),
            Err(e) => {
                eprintln!("cannot write explanation: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn build_pipeline(cli: &Cli) -> Result<AnalysisPipeline, PipelineError> {
    let mut config = AnalysisConfig::from_env(cli.delivery)?
        .with_transport_format(cli.format)
        .with_params(InferenceParams::default().with_stream(cli.stream));
    config.provider = config.provider.with_shape(cli.provider_shape);
    if let Some(instruction) = &cli.instruction {
        config = config.with_instruction(instruction.clone());
    }
    AnalysisPipeline::from_config(config)
}

fn summarize_startup_error(err: &PipelineError) -> String {
    medexplain::error::summarize_error(err).render()
}

async fn run(pipeline: &AnalysisPipeline, image: UploadedImage, stream: bool) -> InferenceResult {
    let cancel = CancelHandle::new();
    let trigger = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    let options = pipeline.default_options();
    let result = if stream {
        pipeline.run_with(image, options, &cancel, &StreamPrinter).await
    } else {
        pipeline.run_with(image, options, &cancel, &NoopObserver).await
    };
    interrupt.abort();
    result
}
