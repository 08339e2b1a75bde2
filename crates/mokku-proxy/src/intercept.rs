//! Request interceptor: runs ahead of the handlers on every request.
//!
//! Only the two completion endpoints are inspected. Their bodies are buffered,
//! the `model` field is sniffed, and the request is then short-circuited with
//! a simulated quota error, answered as an event stream, or handed on with
//! the buffered body restored.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{debug, info};

use mokku_core::ChatRequest;

use crate::body::BufferedBody;
use crate::config::API_PREFIX;
use crate::error::ApiError;
use crate::propagation::trace_carrier;
use crate::server::AppState;
use crate::stream::stream_chat_completion;

/// Model name that triggers the simulated quota error.
pub const CREDIT_ERROR_MODEL: &str = "credit-error";

/// Chat completion route, relative to `API_PREFIX`.
pub const CHAT_COMPLETIONS_ROUTE: &str = "/chat/completions";
/// Text completion route, relative to `API_PREFIX`.
pub const COMPLETIONS_ROUTE: &str = "/completions";

/// What the interceptor does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interception {
    ChatCompletions,
    Completions,
    Passthrough,
}

/// Decide from method and path alone whether a request is inspected.
pub fn classify(method: &Method, path: &str) -> Interception {
    if method != Method::POST {
        return Interception::Passthrough;
    }
    match path.strip_prefix(API_PREFIX) {
        Some(CHAT_COMPLETIONS_ROUTE) => Interception::ChatCompletions,
        Some(COMPLETIONS_ROUTE) => Interception::Completions,
        _ => Interception::Passthrough,
    }
}

/// Only the field needed to route; everything else is ignored here.
#[derive(Debug, Deserialize)]
struct ModelField {
    #[serde(default)]
    model: String,
}

fn sniff_model(body: &[u8]) -> Result<String, ApiError> {
    serde_json::from_slice::<ModelField>(body)
        .map(|field| field.model)
        .map_err(|e| {
            debug!(error = %e, "Request body is not valid JSON");
            ApiError::MalformedBody
        })
}

/// Middleware entry point, installed with `middleware::from_fn_with_state`.
pub async fn intercept(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let route = classify(request.method(), request.uri().path());
    let result = match route {
        Interception::Passthrough => return next.run(request).await,
        Interception::ChatCompletions => intercept_chat(&state, request, next).await,
        Interception::Completions => intercept_completion(&state, request, next).await,
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

async fn intercept_chat(
    state: &AppState,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let buffered = BufferedBody::read(body, state.config.max_body_bytes).await?;

    reject_credit_error(&sniff_model(buffered.as_bytes())?)?;

    let chat: ChatRequest = serde_json::from_slice(buffered.as_bytes()).map_err(|e| {
        debug!(error = %e, "Chat request failed to parse");
        ApiError::MalformedBody
    })?;

    if chat.wants_stream() {
        return Ok(stream_chat_completion(
            &chat,
            state.telemetry.as_ref(),
            &trace_carrier(&parts.headers),
        ));
    }

    Ok(next.run(Request::from_parts(parts, buffered.replay())).await)
}

async fn intercept_completion(
    state: &AppState,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let buffered = BufferedBody::read(body, state.config.max_body_bytes).await?;

    reject_credit_error(&sniff_model(buffered.as_bytes())?)?;

    Ok(next.run(Request::from_parts(parts, buffered.replay())).await)
}

fn reject_credit_error(model: &str) -> Result<(), ApiError> {
    if model == CREDIT_ERROR_MODEL {
        info!(model = %model, "Simulating insufficient quota");
        return Err(ApiError::InsufficientQuota);
    }
    Ok(())
}
