//! In-memory telemetry sink for asserting on emitted spans in tests.

use std::sync::{Arc, Mutex, PoisonError};

use super::telemetry::{Attribute, AttributeValue, Telemetry, TelemetrySpan, TraceCarrier};

/// A span captured by `RecordingTelemetry` once it ended or was dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpan {
    pub name: String,
    /// Name of the enclosing span, if this was started with `child`.
    pub parent: Option<String>,
    /// `traceparent` the span was started under, for spans continuing a
    /// caller's trace.
    pub remote_parent: Option<String>,
    pub attributes: Vec<Attribute>,
    /// `false` when the span was dropped without `end`.
    pub ended: bool,
}

impl RecordedSpan {
    /// Last value recorded for `key`.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .rev()
            .find(|attr| attr.key == key)
            .map(|attr| &attr.value)
    }

    /// Last string value recorded for `key`.
    pub fn str_attribute(&self, key: &str) -> Option<&str> {
        match self.attribute(key) {
            Some(AttributeValue::String(s)) => Some(s),
            _ => None,
        }
    }
}

type SpanLog = Arc<Mutex<Vec<RecordedSpan>>>;

/// Telemetry sink that keeps every finished span in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    spans: SpanLog,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all finished spans, in completion order.
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The first finished span with the given name.
    pub fn span(&self, name: &str) -> Option<RecordedSpan> {
        self.spans().into_iter().find(|span| span.name == name)
    }
}

impl Telemetry for RecordingTelemetry {
    fn start_span(&self, name: &str) -> Box<dyn TelemetrySpan> {
        Box::new(RecordingSpan::new(self.spans.clone(), name, None))
    }

    fn start_span_with_parent(&self, name: &str, parent: &TraceCarrier) -> Box<dyn TelemetrySpan> {
        let mut span = RecordingSpan::new(self.spans.clone(), name, None);
        span.record.remote_parent = parent.get("traceparent").map(str::to_string);
        Box::new(span)
    }
}

struct RecordingSpan {
    log: SpanLog,
    record: RecordedSpan,
}

impl RecordingSpan {
    fn new(log: SpanLog, name: &str, parent: Option<String>) -> Self {
        Self {
            log,
            record: RecordedSpan {
                name: name.to_string(),
                parent,
                remote_parent: None,
                attributes: Vec::new(),
                ended: false,
            },
        }
    }
}

impl TelemetrySpan for RecordingSpan {
    fn set_attributes(&mut self, attributes: Vec<Attribute>) {
        self.record.attributes.extend(attributes);
    }

    fn child(&self, name: &str) -> Box<dyn TelemetrySpan> {
        Box::new(Self::new(
            self.log.clone(),
            name,
            Some(self.record.name.clone()),
        ))
    }

    fn end(mut self: Box<Self>) {
        self.record.ended = true;
    }
}

impl Drop for RecordingSpan {
    fn drop(&mut self) {
        let record = std::mem::replace(
            &mut self.record,
            RecordedSpan {
                name: String::new(),
                parent: None,
                remote_parent: None,
                attributes: Vec::new(),
                ended: false,
            },
        );
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}
