//! Core domain types and ports for the openai-mokku mock server.
//!
//! This crate knows nothing about HTTP. It owns the request shapes that the
//! interceptor inspects, the echo synthesis rule, and the telemetry port that
//! adapters implement.

#![deny(unsafe_code)]

pub mod domain;
pub mod echo;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{ChatMessage, ChatRequest, CompletionRequest, MessageRole, Prompt, StopSequences};
pub use echo::{ECHO_PREFIX, synthesize, synthesize_traced};
pub use ports::{
    Attribute, AttributeValue, NoopSpan, NoopTelemetry, Telemetry, TelemetrySpan, TraceCarrier,
};

#[cfg(any(test, feature = "test-utils"))]
pub use ports::{RecordedSpan, RecordingTelemetry};
