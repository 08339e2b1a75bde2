//! Integration tests for the request interceptor.
//!
//! Verifies that the completion endpoints:
//! - short-circuit the `credit-error` model with a 402
//! - reject malformed and oversized bodies before any handler runs
//! - hand untouched bodies on to the handlers

mod common;

use axum::body::Body;
use axum::http::StatusCode;
use bytes::Bytes;
use common::{app, app_with_body_limit, body_json, post_json, recorded_app, send};
use futures_util::stream;
use mokku_proxy::INSUFFICIENT_QUOTA_MESSAGE;

const CREDIT_ERROR_BODY: &str =
    r#"{"model":"credit-error","messages":[{"role":"user","content":"x"}]}"#;

#[tokio::test]
async fn test_credit_error_on_chat_completions() {
    let (app, telemetry) = recorded_app();
    let response = send(app, post_json("/v1/chat/completions", CREDIT_ERROR_BODY)).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "insufficient_quota");
    assert_eq!(json["error"]["code"], "insufficient_quota");
    assert_eq!(json["error"]["message"], INSUFFICIENT_QUOTA_MESSAGE);
    assert!(json["error"]["param"].is_null());
    assert!(json.get("choices").is_none());

    // The handler never ran.
    assert!(telemetry.spans().is_empty());
}

#[tokio::test]
async fn test_credit_error_on_completions() {
    let (app, telemetry) = recorded_app();
    let response = send(app, post_json("/v1/completions", CREDIT_ERROR_BODY)).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "insufficient_quota");
    assert!(json.get("choices").is_none());
    assert!(telemetry.spans().is_empty());
}

#[tokio::test]
async fn test_credit_error_wins_over_stream_flag() {
    let body = r#"{"model":"credit-error","messages":[],"stream":true}"#;
    let response = send(app(), post_json("/v1/chat/completions", body)).await;

    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    assert_eq!(response.headers()["content-type"], "application/json");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    for uri in ["/v1/chat/completions", "/v1/completions"] {
        let response = send(app(), post_json(uri, "{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

        let json = body_json(response).await;
        assert_eq!(json["error"]["message"], "Failed to parse request body");
        assert_eq!(json["error"]["type"], "invalid_request_error");
    }
}

#[tokio::test]
async fn test_chat_body_failing_full_parse_is_rejected() {
    let (app, telemetry) = recorded_app();
    let body = r#"{"model":"gpt-4","messages":[{"role":"wizard","content":"x"}]}"#;
    let response = send(app, post_json("/v1/chat/completions", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(telemetry.spans().is_empty());
}

#[tokio::test]
async fn test_completion_body_failing_schema_is_rejected_downstream() {
    let body = r#"{"model":"davinci","prompt":42}"#;
    let response = send(app(), post_json("/v1/completions", body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    let message = json["error"]["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid request body"), "{message}");
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let body = format!(
        r#"{{"model":"gpt-4","messages":[{{"role":"user","content":"{}"}}]}}"#,
        "a".repeat(256)
    );
    let response = send(app_with_body_limit(64), post_json("/v1/chat/completions", body)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let json = body_json(response).await;
    assert_eq!(json["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_body_stream_failure_is_a_bad_request() {
    let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
        Ok(Bytes::from_static(b"{\"model\":\"gpt-4\",")),
        Err(std::io::Error::other("connection reset")),
    ];
    let request = post_json("/v1/chat/completions", Body::from_stream(stream::iter(chunks)));
    let response = send(app(), request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["message"], "Failed to read request body");
}

#[tokio::test]
async fn test_non_streaming_body_reaches_handler_intact() {
    let (app, telemetry) = recorded_app();
    let body = r#"{"model":"gpt-4o","messages":[{"role":"user","content":"Hi"}],"temperature":0,"user":"tester"}"#;
    let response = send(app, post_json("/v1/chat/completions", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["choices"][0]["message"]["content"], "Echo: Hi");

    let span = telemetry.span("CreateChatCompletion.process").unwrap();
    assert_eq!(span.str_attribute("model"), Some("gpt-4o"));
    assert_eq!(span.str_attribute("user"), Some("tester"));
    assert!(span.attribute("temperature").is_some());
    assert!(span.attribute("top_p").is_none());
}

#[tokio::test]
async fn test_stream_false_is_answered_as_json() {
    let body = r#"{"model":"gpt-4","messages":[{"role":"user","content":"Hi"}],"stream":false}"#;
    let response = send(app(), post_json("/v1/chat/completions", body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    let json = body_json(response).await;
    assert_eq!(json["object"], "chat.completion");
}
