//! Shared helpers for router-level tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use mokku_core::{NoopTelemetry, RecordingTelemetry};
use mokku_proxy::{AppState, ServerConfig, create_router};

/// Router with a no-op telemetry sink.
pub fn app() -> Router {
    create_router(AppState::new(
        Arc::new(NoopTelemetry::new()),
        ServerConfig::default(),
    ))
}

/// Router recording spans into the returned sink.
pub fn recorded_app() -> (Router, RecordingTelemetry) {
    let telemetry = RecordingTelemetry::new();
    let app = create_router(AppState::new(
        Arc::new(telemetry.clone()),
        ServerConfig::default(),
    ));
    (app, telemetry)
}

/// Router with a custom body cap.
pub fn app_with_body_limit(limit: usize) -> Router {
    create_router(AppState::new(
        Arc::new(NoopTelemetry::new()),
        ServerConfig::default().with_max_body_bytes(limit),
    ))
}

pub fn post_json(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
