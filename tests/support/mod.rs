//! Shared helpers for the mock API tests
#![allow(dead_code)]

use std::io::Cursor;

use medexplain::prelude::*;
use serde_json::json;
use wiremock::MockServer;

pub const TEST_API_KEY: &str = "test-api-key";
pub const TEST_HOST_KEY: &str = "test-host-key";
pub const TEST_MODEL: &str = "vision-test-model";

/// Small gradient PNG generated in memory
pub fn png_image(width: u32, height: u32) -> UploadedImage {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 30) as u8, (y * 30) as u8, 128])
    });
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode test png");
    UploadedImage::new(bytes).expect("valid test png")
}

pub fn provider_config(server: &MockServer) -> ProviderConfig {
    ProviderConfig::new(TEST_API_KEY)
        .with_base_url(server.uri())
        .with_model(TEST_MODEL)
}

pub fn host_config(server: &MockServer) -> ImageHostConfig {
    ImageHostConfig::new(TEST_HOST_KEY).with_endpoint(format!("{}/1/upload", server.uri()))
}

/// Chat completion body in the common `choices[0].message.content` shape
pub fn chat_completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-123",
        "object": "chat.completion",
        "model": TEST_MODEL,
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 9, "completion_tokens": 12, "total_tokens": 21 }
    })
}

/// imgbb-style success body
pub fn upload_success(url: &str) -> serde_json::Value {
    json!({
        "success": true,
        "status": 200,
        "data": { "id": "abc123", "url": url, "display_url": url }
    })
}

/// SSE body with one delta per fragment, optionally terminated by `[DONE]`
pub fn sse_body(fragments: &[&str], done: bool) -> String {
    let mut body = String::new();
    for fragment in fragments {
        let chunk = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "choices": [{ "index": 0, "delta": { "content": fragment }, "finish_reason": null }]
        });
        body.push_str(&format!("data: {chunk}\n\n"));
    }
    if done {
        let last = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion.chunk",
            "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }]
        });
        body.push_str(&format!("data: {last}\n\n"));
        body.push_str("data: [DONE]\n\n");
    }
    body
}
