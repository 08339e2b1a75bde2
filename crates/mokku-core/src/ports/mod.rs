//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the core domain expects from infrastructure.
//! They contain no implementation details and use only domain types.

pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
mod recording;

pub use telemetry::{
    Attribute, AttributeValue, NoopSpan, NoopTelemetry, Telemetry, TelemetrySpan, TraceCarrier,
};

#[cfg(any(test, feature = "test-utils"))]
pub use recording::{RecordedSpan, RecordingTelemetry};
