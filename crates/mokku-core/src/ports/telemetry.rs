//! Telemetry port for request-level tracing spans.
//!
//! The interceptor and the downstream responder describe each request as a
//! named span carrying key/value attributes. Implementations decide where the
//! spans go (OpenTelemetry collector, test recorder, nowhere).
//!
//! Recording is advisory: implementations must never block the caller and
//! must swallow their own failures, so request handling behaves the same
//! whether or not a collector is reachable.

use std::fmt;

/// A single attribute value attached to a span.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// A key/value pair recorded on a span.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: &'static str,
    pub value: AttributeValue,
}

impl Attribute {
    pub fn string(key: &'static str, value: impl Into<String>) -> Self {
        Self {
            key,
            value: AttributeValue::String(value.into()),
        }
    }

    pub const fn int(key: &'static str, value: i64) -> Self {
        Self {
            key,
            value: AttributeValue::Int(value),
        }
    }

    pub const fn float(key: &'static str, value: f64) -> Self {
        Self {
            key,
            value: AttributeValue::Float(value),
        }
    }

    pub const fn bool(key: &'static str, value: bool) -> Self {
        Self {
            key,
            value: AttributeValue::Bool(value),
        }
    }
}

/// Trace-context headers received with a request (`traceparent`,
/// `tracestate`, `baggage`).
///
/// Keys are stored lowercase; values are kept as sent. Implementations decide
/// how to decode them, so an invalid `traceparent` simply yields a root span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceCarrier {
    entries: Vec<(String, String)>,
}

impl TraceCarrier {
    /// Header names that carry trace context.
    pub const HEADERS: [&'static str; 3] = ["traceparent", "tracestate", "baggage"];

    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing any earlier value.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let key = key.to_ascii_lowercase();
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = key.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide handle for starting spans.
///
/// Shared across all concurrent requests as `Arc<dyn Telemetry>`, so
/// implementations must tolerate concurrent `start_span` calls without
/// serializing them.
///
/// # Implementations
///
/// - `NoopTelemetry` - For tests and runs without a collector
/// - `RecordingTelemetry` - Captures spans in memory (`test-utils` feature)
/// - `OtelTelemetry` in `mokku-proxy` - Exports through OpenTelemetry
#[cfg_attr(test, mockall::automock)]
pub trait Telemetry: Send + Sync {
    /// Start a new root span.
    fn start_span(&self, name: &str) -> Box<dyn TelemetrySpan>;

    /// Start a span continuing the caller's trace described by `parent`.
    ///
    /// Sinks without cross-process tracing ignore the carrier.
    fn start_span_with_parent(&self, name: &str, parent: &TraceCarrier) -> Box<dyn TelemetrySpan> {
        let _ = parent;
        self.start_span(name)
    }
}

/// An open span. Dropping a span without calling `end` ends it implicitly.
pub trait TelemetrySpan: Send {
    /// Attach attributes. Later values for the same key win.
    fn set_attributes(&mut self, attributes: Vec<Attribute>);

    /// Start a span nested under this one.
    fn child(&self, name: &str) -> Box<dyn TelemetrySpan>;

    /// Finish the span.
    fn end(self: Box<Self>);

    /// Attach a single attribute.
    fn set_attribute(&mut self, attribute: Attribute) {
        self.set_attributes(vec![attribute]);
    }
}

/// A no-op telemetry sink for tests and collector-less runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl NoopTelemetry {
    /// Create a new no-op sink.
    pub const fn new() -> Self {
        Self
    }
}

impl Telemetry for NoopTelemetry {
    fn start_span(&self, _name: &str) -> Box<dyn TelemetrySpan> {
        Box::new(NoopSpan)
    }
}

/// Span returned by `NoopTelemetry`; discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpan;

impl TelemetrySpan for NoopSpan {
    fn set_attributes(&mut self, _attributes: Vec<Attribute>) {}

    fn child(&self, _name: &str) -> Box<dyn TelemetrySpan> {
        Box::new(Self)
    }

    fn end(self: Box<Self>) {}
}
