//! Mock API tests for the inference client
//!
//! Covers the chat-completions and simplified endpoint shapes, status and
//! transport failures, and SSE streaming.

mod support;

use std::time::Duration;

use medexplain::inference::collect_explanation;
use medexplain::prelude::*;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::{TEST_API_KEY, TEST_MODEL, chat_completion, provider_config, sse_body};

const SCAN_URL: &str = "https://i.ibb.co/x/scan.jpg";

fn request(provider: &ProviderConfig) -> InferenceRequest {
    InferenceRequestBuilder::for_provider(provider)
        .instruction("Explain this scan")
        .image(ImageReference::hosted(SCAN_URL))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_chat_completion_non_streaming() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", format!("Bearer {TEST_API_KEY}").as_str()))
        .and(body_partial_json(json!({
            "model": TEST_MODEL,
            "max_tokens": 500,
            "stream": false
        })))
        .and(body_string_contains("\"type\":\"image_url\""))
        .and(body_string_contains(SCAN_URL))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion("The lungs look clear.")),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke(&request(&provider)).await;
    assert_eq!(result, InferenceResult::success("The lungs look clear."));
}

#[tokio::test]
async fn test_text_embedded_shape_inlines_reference() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_string_contains("Explain this scan\\n\\nImage: https://i.ibb.co/x/scan.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("A guess.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server).with_shape(PayloadShape::TextEmbedded);
    let client = InferenceClient::new(provider.clone()).unwrap();
    assert_eq!(client.chat(&request(&provider)).await.unwrap(), "A guess.");
}

#[tokio::test]
async fn test_simplified_endpoint_output_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/analyze"))
        .and(body_partial_json(json!({ "image": SCAN_URL })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "output_text": "Fracture of the radius." })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server)
        .with_base_url(format!("{}/v1/analyze", mock_server.uri()))
        .with_shape(PayloadShape::SimplifiedEndpoint);
    let client = InferenceClient::new(provider.clone()).unwrap();
    assert_eq!(
        client.chat(&request(&provider)).await.unwrap(),
        "Fracture of the radius."
    );
}

#[tokio::test]
async fn test_max_completion_tokens_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "max_completion_tokens": 500 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("ok")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server)
        .with_token_limit_field(TokenLimitField::MaxCompletionTokens);
    let client = InferenceClient::new(provider.clone()).unwrap();
    assert!(client.invoke(&request(&provider)).await.is_success());
}

#[tokio::test]
async fn test_unrecognized_shape_is_never_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": "hello" })))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    match client.invoke(&request(&provider)).await {
        InferenceResult::Failure { kind, detail } => {
            assert_eq!(kind, ErrorKind::UnrecognizedResponseShape);
            assert!(detail.contains("\"result\""));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_status_is_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "No auth credentials found", "code": 401 }
        })))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let err = client.chat(&request(&provider)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderError);
    assert_eq!(err.status_code(), Some(401));
    assert!(err.detail().contains("No auth credentials found"));
}

#[tokio::test]
async fn test_error_status_wins_over_valid_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_json(chat_completion("looks fine")))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke(&request(&provider)).await;
    assert_eq!(result.failure_kind(), Some(ErrorKind::ProviderError));
}

#[tokio::test]
async fn test_malformed_body_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke(&request(&provider)).await;
    assert_eq!(result.failure_kind(), Some(ErrorKind::TransportError));
}

#[tokio::test]
async fn test_timeout_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(chat_completion("too late"))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server)
        .with_http_config(HttpConfig::default().with_timeout(Duration::from_millis(100)));
    let client = InferenceClient::new(provider.clone()).unwrap();
    let err = client.chat(&request(&provider)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportError);
    assert!(err.detail().contains("timed out"));
}

#[tokio::test]
async fn test_streaming_concatenates_in_arrival_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Accept", "text/event-stream"))
        .and(body_partial_json(json!({ "stream": true })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["A", "B", "C"], true), "text/event-stream"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let stream = client.chat_stream(&request(&provider)).await.unwrap();

    let mut partials = Vec::new();
    let text = collect_explanation(stream, |chunk| partials.push((chunk.index, chunk.text.clone())))
        .await
        .unwrap();
    assert_eq!(text, "ABC");
    assert_eq!(
        partials,
        vec![(0, "A".to_string()), (1, "B".to_string()), (2, "C".to_string())]
    );
}

#[tokio::test]
async fn test_stream_without_end_signal_is_transport_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body(&["A", "B"], false), "text/event-stream"),
        )
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke_streaming(&request(&provider)).await;
    match result {
        InferenceResult::Failure { kind, detail } => {
            assert_eq!(kind, ErrorKind::TransportError);
            assert!(!detail.contains("AB"));
        }
        other => panic!("partial text must not become a success: {other:?}"),
    }
}

#[tokio::test]
async fn test_stream_error_payload_is_transport_error() {
    let mock_server = MockServer::start().await;

    let mut body = sse_body(&["Partial"], false);
    body.push_str("data: {\"error\":{\"message\":\"upstream overloaded\"}}\n\n");
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke_streaming(&request(&provider)).await;
    assert_eq!(result.failure_kind(), Some(ErrorKind::TransportError));
}

#[tokio::test]
async fn test_stream_request_answered_with_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Whole answer")))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let result = client.invoke_streaming(&request(&provider)).await;
    assert_eq!(result, InferenceResult::success("Whole answer"));
}

#[tokio::test]
async fn test_stream_error_status_is_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .mount(&mock_server)
        .await;

    let provider = provider_config(&mock_server);
    let client = InferenceClient::new(provider.clone()).unwrap();
    let err = match client.chat_stream(&request(&provider)).await {
        Err(err) => err,
        Ok(_) => panic!("expected provider error"),
    };
    assert_eq!(err.status_code(), Some(429));
}
