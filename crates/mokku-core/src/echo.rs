//! Echo synthesis: the mock's only "generation" behavior.

use crate::ports::{Attribute, TelemetrySpan};

/// Marker prepended to every synthesized reply.
pub const ECHO_PREFIX: &str = "Echo: ";

/// Derive the reply for `text`. Total, pure and deterministic.
pub fn synthesize(text: &str) -> String {
    format!("{ECHO_PREFIX}{text}")
}

/// Same as [`synthesize`], recorded as a `generateEchoResponse` child span.
pub fn synthesize_traced(parent: &dyn TelemetrySpan, text: &str) -> String {
    let mut span = parent.child("generateEchoResponse");
    span.set_attribute(Attribute::string("input_message", text));

    let reply = synthesize(text);

    span.set_attribute(Attribute::string("echo_response", reply.clone()));
    span.end();
    reply
}
