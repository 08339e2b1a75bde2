//! OpenTelemetry adapter for the telemetry port.
//!
//! Spans are exported over OTLP/gRPC through a batch processor, so recording
//! never waits on the collector. An unreachable collector only shows up as
//! export errors in the SDK's own logs.
//!
//! Incoming `traceparent`/`tracestate`/`baggage` headers are decoded with the
//! globally installed W3C propagators, so a client's trace continues into the
//! mock's operation spans.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::{
    Context, KeyValue, global,
    propagation::{Extractor, TextMapCompositePropagator, TextMapPropagator},
    trace::{Span, TraceContextExt, Tracer},
};
use opentelemetry_otlp::{SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{Sampler, SdkTracerProvider},
};
use thiserror::Error;
use tracing::{info, warn};

use mokku_core::{Attribute, AttributeValue, Telemetry, TelemetrySpan, TraceCarrier};

/// `service.name` reported to the collector.
pub const SERVICE_NAME: &str = "openai-mokku";

/// Collector used when `OTEL_EXPORTER_OTLP_ENDPOINT` is not set.
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

const EXPORT_TIMEOUT: Duration = Duration::from_secs(3);

/// Failure to set up span export.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to build OTLP exporter for {endpoint}: {reason}")]
    Exporter { endpoint: String, reason: String },
}

/// Owns the installed tracer provider; flushes pending spans on shutdown.
#[derive(Debug)]
pub struct TracerGuard {
    provider: SdkTracerProvider,
}

impl TracerGuard {
    /// Flush buffered spans and stop the exporter.
    pub fn shutdown(self) {
        match self.provider.shutdown() {
            Ok(()) => info!("Telemetry flushed"),
            Err(e) => warn!(error = %e, "Telemetry shutdown failed"),
        }
    }
}

/// Install a global OTLP tracer provider exporting to `endpoint`.
pub fn init_tracer_provider(endpoint: &str) -> Result<TracerGuard, TelemetryInitError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(EXPORT_TIMEOUT)
        .build()
        .map_err(|e| TelemetryInitError::Exporter {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .with_sampler(Sampler::AlwaysOn)
        .build();

    global::set_tracer_provider(provider.clone());
    install_propagator();
    info!(endpoint = %endpoint, "OpenTelemetry exporter initialized");

    Ok(TracerGuard { provider })
}

/// Install W3C trace-context and baggage as the global text-map propagator.
pub fn install_propagator() {
    global::set_text_map_propagator(TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]));
}

/// Adapts a `TraceCarrier` to the propagator API.
struct CarrierExtractor<'a>(&'a TraceCarrier);

impl Extractor for CarrierExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().collect()
    }
}

/// Decode the caller's context with the global propagator.
fn remote_context(carrier: &TraceCarrier) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&CarrierExtractor(carrier)))
}

/// `Telemetry` backed by the global OpenTelemetry tracer.
///
/// Without a prior `init_tracer_provider` the global provider is a no-op, so
/// this is safe to construct in tests.
#[derive(Clone)]
pub struct OtelTelemetry {
    tracer: Arc<global::BoxedTracer>,
}

impl OtelTelemetry {
    pub fn new() -> Self {
        Self {
            tracer: Arc::new(global::tracer(SERVICE_NAME)),
        }
    }
}

impl Default for OtelTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry for OtelTelemetry {
    fn start_span(&self, name: &str) -> Box<dyn TelemetrySpan> {
        let span = self.tracer.start(name.to_string());
        Box::new(OtelSpan {
            tracer: Arc::clone(&self.tracer),
            span,
        })
    }

    fn start_span_with_parent(&self, name: &str, parent: &TraceCarrier) -> Box<dyn TelemetrySpan> {
        if parent.is_empty() {
            return self.start_span(name);
        }
        let cx = remote_context(parent);
        let span = self.tracer.start_with_context(name.to_string(), &cx);
        Box::new(OtelSpan {
            tracer: Arc::clone(&self.tracer),
            span,
        })
    }
}

struct OtelSpan {
    tracer: Arc<global::BoxedTracer>,
    span: global::BoxedSpan,
}

impl TelemetrySpan for OtelSpan {
    fn set_attributes(&mut self, attributes: Vec<Attribute>) {
        self.span
            .set_attributes(attributes.into_iter().map(to_key_value));
    }

    fn child(&self, name: &str) -> Box<dyn TelemetrySpan> {
        let parent = Context::new().with_remote_span_context(self.span.span_context().clone());
        let span = self.tracer.start_with_context(name.to_string(), &parent);
        Box::new(Self {
            tracer: Arc::clone(&self.tracer),
            span,
        })
    }

    fn end(mut self: Box<Self>) {
        self.span.end();
    }
}

fn to_key_value(attribute: Attribute) -> KeyValue {
    match attribute.value {
        AttributeValue::String(v) => KeyValue::new(attribute.key, v),
        AttributeValue::Int(v) => KeyValue::new(attribute.key, v),
        AttributeValue::Float(v) => KeyValue::new(attribute.key, v),
        AttributeValue::Bool(v) => KeyValue::new(attribute.key, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::Value;

    #[test]
    fn test_attribute_conversion() {
        let kv = to_key_value(Attribute::string("model", "gpt-4o"));
        assert_eq!(kv.key.as_str(), "model");
        assert_eq!(kv.value, Value::from("gpt-4o".to_string()));

        assert_eq!(to_key_value(Attribute::int("n", 2)).value, Value::I64(2));
        assert_eq!(to_key_value(Attribute::float("top_p", 0.5)).value, Value::F64(0.5));
        assert_eq!(to_key_value(Attribute::bool("stream", true)).value, Value::Bool(true));
    }

    const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    fn carrier() -> TraceCarrier {
        let mut carrier = TraceCarrier::new();
        carrier.insert("traceparent", TRACEPARENT);
        carrier.insert("baggage", "tenant=acme");
        carrier
    }

    #[test]
    fn test_trace_context_is_extracted_from_carrier() {
        let carrier = carrier();
        let cx = TraceContextPropagator::new().extract(&CarrierExtractor(&carrier));
        let span = cx.span();
        let remote = span.span_context();

        assert!(remote.is_valid());
        assert!(remote.is_remote());
        assert_eq!(remote.trace_id().to_string(), "0af7651916cd43dd8448eb211c80319c");
        assert_eq!(remote.span_id().to_string(), "b7ad6b7169203331");
    }

    #[test]
    fn test_installed_propagator_decodes_trace_and_baggage() {
        use opentelemetry::baggage::BaggageExt;

        install_propagator();
        let cx = remote_context(&carrier());

        assert_eq!(
            cx.span().span_context().trace_id().to_string(),
            "0af7651916cd43dd8448eb211c80319c"
        );
        assert_eq!(
            cx.baggage().get("tenant").map(ToString::to_string),
            Some("acme".to_string())
        );
    }

    #[test]
    fn test_parented_span_without_installed_provider() {
        let telemetry = OtelTelemetry::new();
        let span = telemetry.start_span_with_parent("CreateChatCompletion.process", &carrier());
        span.child("generateEchoResponse").end();
        span.end();
    }

    #[test]
    fn test_spans_without_installed_provider() {
        let telemetry = OtelTelemetry::new();
        let mut span = telemetry.start_span("CreateChatCompletion.process");
        span.set_attribute(Attribute::string("model", "gpt-4o"));
        let mut child = span.child("generateEchoResponse");
        child.set_attribute(Attribute::string("input_message", "Hi"));
        child.end();
        span.end();
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_reported() {
        let err = init_tracer_provider("http://bad host:4317").unwrap_err();
        assert!(matches!(err, TelemetryInitError::Exporter { .. }));
    }
}
