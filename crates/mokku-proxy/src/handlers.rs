//! Downstream responder: the schema-bound handlers behind the interceptor.
//!
//! Every handler opens one span named after its operation, parented on the
//! caller's trace context when one was sent, records the request summary on
//! it, and ends it before returning.

use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use mokku_core::{Attribute, ChatRequest, CompletionRequest, TelemetrySpan, synthesize_traced};

use crate::error::ApiError;
use crate::models::{
    AssistantMessage, ChatChoice, ChatCompletionResponse, CompletionChoice, CompletionResponse,
    ModelInfo, ModelsResponse, SYSTEM_FINGERPRINT, Usage, chat_completion_id, completion_id,
    unix_now,
};
use crate::propagation::trace_carrier;
use crate::server::AppState;

/// Models advertised by `GET /v1/models`.
pub const CATALOG: &[&str] = &["mokku-echo-1", "gpt-4o", "gpt-4o-mini"];

/// Health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// `POST /v1/chat/completions` for requests that are not streamed.
pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ChatCompletionResponse>, ApiError> {
    let request: ChatRequest = parse_body(&body)?;
    debug!(model = %request.model, messages = request.messages.len(), "Chat completion");

    let mut span = state
        .telemetry
        .start_span_with_parent("CreateChatCompletion.process", &trace_carrier(&headers));
    span.set_attributes(request.telemetry_attributes());
    record_json(span.as_mut(), "request.full_json", &request);

    let input = request.last_user_message();
    let reply = synthesize_traced(span.as_ref(), input);
    let usage = Usage::approximate(input, &reply);

    let response = ChatCompletionResponse {
        id: chat_completion_id(),
        object: "chat.completion".to_string(),
        created: unix_now(),
        model: request.model.clone(),
        choices: vec![ChatChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".to_string(),
                content: reply,
            },
            finish_reason: "stop".to_string(),
        }],
        usage,
        system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
    };

    record_usage(span.as_mut(), &response.id, usage);
    record_json(span.as_mut(), "response.full_json", &response);
    span.end();

    Ok(Json(response))
}

/// `POST /v1/completions`.
pub async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CompletionResponse>, ApiError> {
    let request: CompletionRequest = parse_body(&body)?;
    debug!(model = %request.model, prompts = request.prompt.len(), "Text completion");

    let mut span = state
        .telemetry
        .start_span_with_parent("CreateCompletion.process", &trace_carrier(&headers));
    span.set_attributes(request.telemetry_attributes());
    record_json(span.as_mut(), "request.full_json", &request);

    let input = request.prompt.resolve();
    let reply = synthesize_traced(span.as_ref(), input);
    let usage = Usage::approximate(input, &reply);

    let response = CompletionResponse {
        id: completion_id(),
        object: "text_completion".to_string(),
        created: unix_now(),
        model: request.model.clone(),
        choices: vec![CompletionChoice {
            index: 0,
            text: reply,
            logprobs: None,
            finish_reason: "stop".to_string(),
        }],
        usage,
        system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
    };

    record_usage(span.as_mut(), &response.id, usage);
    record_json(span.as_mut(), "response.full_json", &response);
    span.end();

    Ok(Json(response))
}

/// `GET /v1/models`. Never fails.
pub async fn list_models(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<ModelsResponse> {
    let mut span = state
        .telemetry
        .start_span_with_parent("ListModels.process", &trace_carrier(&headers));

    let created = unix_now();
    let data: Vec<ModelInfo> = CATALOG
        .iter()
        .map(|id| ModelInfo::mock(*id, created))
        .collect();

    span.set_attribute(Attribute::int(
        "model_count",
        i64::try_from(data.len()).unwrap_or(i64::MAX),
    ));
    span.end();

    Json(ModelsResponse {
        object: "list".to_string(),
        data,
    })
}

/// `GET /v1/models/{model}`. Any id is reported as existing.
pub async fn retrieve_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(model): Path<String>,
) -> Json<ModelInfo> {
    let mut span = state
        .telemetry
        .start_span_with_parent("RetrieveModel.process", &trace_carrier(&headers));
    span.set_attribute(Attribute::string("model", model.clone()));
    span.end();

    Json(ModelInfo::mock(model, unix_now()))
}

/// `POST /v1/embeddings`: declared by the API, not mocked.
pub async fn create_embeddings() -> ApiError {
    ApiError::NotImplemented("createEmbedding")
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid request body: {e}")))
}

fn record_json<T: Serialize>(span: &mut dyn TelemetrySpan, key: &'static str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        span.set_attribute(Attribute::string(key, json));
    }
}

fn record_usage(span: &mut dyn TelemetrySpan, id: &str, usage: Usage) {
    span.set_attributes(vec![
        Attribute::string("response.id", id),
        Attribute::int("usage.prompt_tokens", i64::from(usage.prompt_tokens)),
        Attribute::int("usage.completion_tokens", i64::from(usage.completion_tokens)),
        Attribute::int("usage.total_tokens", i64::from(usage.total_tokens)),
    ]);
}
