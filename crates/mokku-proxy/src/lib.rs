//! OpenAI-compatible mock HTTP server.
//!
//! Answers the chat completion, text completion and model catalog endpoints
//! with deterministic echo responses. The model `credit-error` simulates an
//! exhausted quota; `stream: true` chat requests are answered as server-sent
//! events.

#![deny(unsafe_code)]

mod body;
mod config;
mod error;
mod handlers;
mod intercept;
mod models;
mod otel;
mod propagation;
mod server;
mod stream;

pub use body::{BodyReadError, BufferedBody};
pub use config::{API_PREFIX, DEFAULT_MAX_BODY_BYTES, DEFAULT_SHUTDOWN_GRACE, ServerConfig};
pub use error::{ApiError, INSUFFICIENT_QUOTA_MESSAGE};
pub use handlers::CATALOG;
pub use intercept::{CREDIT_ERROR_MODEL, Interception, classify};
pub use models::{
    ChatCompletionChunk, ChatCompletionResponse, CompletionResponse, ErrorResponse, ModelInfo,
    ModelsResponse, SYSTEM_FINGERPRINT, Usage,
};
pub use otel::{
    DEFAULT_OTLP_ENDPOINT, OtelTelemetry, SERVICE_NAME, TelemetryInitError, TracerGuard,
    init_tracer_provider, install_propagator,
};
pub use propagation::trace_carrier;
pub use server::{AppState, create_router, serve};
pub use stream::{DONE_FRAME, encode_frame};
