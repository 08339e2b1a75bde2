//! Reading trace-context headers off incoming requests.

use axum::http::HeaderMap;

use mokku_core::TraceCarrier;

/// Collect the W3C trace-context headers of a request.
///
/// Values that are not visible ASCII are skipped.
pub fn trace_carrier(headers: &HeaderMap) -> TraceCarrier {
    let mut carrier = TraceCarrier::new();
    for name in TraceCarrier::HEADERS {
        if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
            carrier.insert(name, value);
        }
    }
    carrier
}
