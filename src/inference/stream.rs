//! Streaming delivery.
//!
//! A provider stream is exposed as a finite, single-use sequence of
//! `StreamEvent`s that ends with an explicit `StreamEvent::End` or an error.
//! Running out of items without `End` is itself an error.

use std::pin::Pin;

use eventsource_stream::Eventsource;
use futures::Stream;
use futures_util::StreamExt;
use serde_json::Value;

use super::normalize;
use crate::error::{PipelineError, truncate_detail};
use crate::types::{StreamChunk, StreamEvent};

/// End-of-stream sentinel used by chat-completions providers
pub const DONE_SENTINEL: &str = "[DONE]";

/// Boxed explanation stream
pub type ExplanationStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, PipelineError>> + Send>>;

/// Turn a raw SSE byte stream into explanation events.
///
/// Natural end is `[DONE]`, or the connection closing after a chunk reported
/// a `finish_reason`. Parse failures, mid-stream `error` payloads and early
/// closes terminate the sequence with `PipelineError::Transport`.
pub fn decode_sse<S, B, E>(bytes: S) -> ExplanationStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let events = async_stream::stream! {
        let mut sse = std::pin::pin!(bytes.eventsource());
        let mut index = 0usize;
        let mut finished = false;

        while let Some(item) = sse.next().await {
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    yield Err(PipelineError::Transport(format!("stream interrupted: {e}")));
                    return;
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                yield Ok(StreamEvent::End);
                return;
            }

            let chunk: Value = match serde_json::from_str(data) {
                Ok(v) => v,
                Err(e) => {
                    yield Err(PipelineError::Transport(format!(
                        "malformed stream chunk ({e}): {}",
                        truncate_detail(data)
                    )));
                    return;
                }
            };

            if let Some(error) = chunk.get("error") {
                yield Err(PipelineError::Transport(format!(
                    "provider aborted the stream: {}",
                    truncate_detail(&error.to_string())
                )));
                return;
            }

            if let Some(text) = normalize::stream_delta(&chunk) {
                yield Ok(StreamEvent::Chunk(StreamChunk { index, text }));
                index += 1;
            }
            if normalize::finish_reason(&chunk).is_some() {
                finished = true;
            }
        }

        if finished {
            yield Ok(StreamEvent::End);
        } else {
            yield Err(PipelineError::Transport(
                "stream closed before the provider signalled completion".to_string(),
            ));
        }
    };
    Box::pin(events)
}

/// A complete explanation delivered as a one-chunk stream.
pub fn single_chunk(text: String) -> ExplanationStream {
    Box::pin(futures::stream::iter([
        Ok(StreamEvent::Chunk(StreamChunk { index: 0, text })),
        Ok(StreamEvent::End),
    ]))
}

/// Drain a stream to its natural end, concatenating fragments in arrival order.
///
/// `on_partial` sees every fragment as it arrives. Accumulated text is
/// discarded when the stream fails; partial text is never returned as a result.
pub async fn collect_explanation<F>(
    mut stream: ExplanationStream,
    mut on_partial: F,
) -> Result<String, PipelineError>
where
    F: FnMut(&StreamChunk),
{
    let mut buffer = String::new();
    while let Some(item) = stream.next().await {
        match item? {
            StreamEvent::Chunk(chunk) => {
                on_partial(&chunk);
                buffer.push_str(&chunk.text);
            }
            StreamEvent::End => {
                if buffer.is_empty() {
                    return Err(PipelineError::UnrecognizedResponseShape(
                        "stream completed without any content".to_string(),
                    ));
                }
                return Ok(buffer);
            }
        }
    }
    Err(PipelineError::Transport(
        "stream ended without an end-of-stream signal".to_string(),
    ))
}
