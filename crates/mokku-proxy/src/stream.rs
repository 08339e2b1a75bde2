//! Server-sent event streaming for chat completions.
//!
//! A streamed reply is always the same four writes:
//!
//! 1. a chunk announcing `role: "assistant"`
//! 2. a chunk carrying the whole echo as one content fragment
//! 3. an empty-delta chunk with `finish_reason: "stop"`
//! 4. the `data: [DONE]` sentinel
//!
//! Frames are built lazily as the body is polled, so each one is handed to
//! the transport before the next is encoded. If the client goes away the body
//! stream is dropped and the remaining frames are never produced.

use axum::{
    body::Body,
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use bytes::{BufMut, Bytes, BytesMut};
use futures_util::Stream;
use serde::Serialize;
use tracing::{debug, warn};

use mokku_core::{
    Attribute, ChatRequest, Telemetry, TelemetrySpan, TraceCarrier, synthesize_traced,
};

use crate::error::ApiError;
use crate::models::{
    ChatChunkChoice, ChatCompletionChunk, ChatDelta, SYSTEM_FINGERPRINT, chat_completion_id,
    unix_now,
};

/// Terminal frame of every event stream.
pub const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

const DATA_PREFIX: &[u8] = b"data: ";
const FRAME_TERMINATOR: &[u8] = b"\n\n";

/// Span covering one streamed chat completion.
pub const STREAMING_SPAN: &str = "CreateChatCompletion.streaming";

/// Encode `event` as one `data: <json>\n\n` frame.
///
/// Compact JSON never contains a raw newline, so the payload stays on a
/// single line.
pub fn encode_frame<T: Serialize>(event: &T) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_vec(event)?;
    let mut buf = BytesMut::with_capacity(DATA_PREFIX.len() + json.len() + FRAME_TERMINATOR.len());
    buf.put_slice(DATA_PREFIX);
    buf.put_slice(&json);
    buf.put_slice(FRAME_TERMINATOR);
    Ok(buf.freeze())
}

/// Build the event-stream response for a chat request with `stream: true`.
///
/// The streaming span is parented on the caller's trace context in `parent`.
pub fn stream_chat_completion(
    request: &ChatRequest,
    telemetry: &dyn Telemetry,
    parent: &TraceCarrier,
) -> Response {
    let mut span = telemetry.start_span_with_parent(STREAMING_SPAN, parent);
    span.set_attributes(request.telemetry_attributes());
    span.set_attribute(Attribute::bool("stream", true));
    if let Ok(json) = serde_json::to_string(request) {
        span.set_attribute(Attribute::string("request.full_json", json));
    }

    let reply = synthesize_traced(span.as_ref(), request.last_user_message());
    span.set_attribute(Attribute::string("response.echo_message", reply.clone()));

    debug!(model = %request.model, "Streaming chat completion");

    let frames = chunk_stream(ChunkStream::new(request.model.clone(), reply, span));

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/event-stream")
        .header(CACHE_CONTROL, "no-cache")
        .header(CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no")
        .body(Body::from_stream(frames))
        .unwrap_or_else(|_| ApiError::StreamingUnsupported.into_response())
}

/// Which write comes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Role,
    Content,
    Finish,
    Done,
    Closed,
}

/// State threaded through the `unfold` stream.
struct ChunkStream {
    stage: Stage,
    /// Shared by every chunk of this response.
    id: String,
    created: i64,
    model: String,
    reply: Option<String>,
    span: Option<Box<dyn TelemetrySpan>>,
    frames_sent: i64,
}

impl ChunkStream {
    fn new(model: String, reply: String, span: Box<dyn TelemetrySpan>) -> Self {
        Self {
            stage: Stage::Role,
            id: chat_completion_id(),
            created: unix_now(),
            model,
            reply: Some(reply),
            span: Some(span),
            frames_sent: 0,
        }
    }

    fn chunk(&self, delta: ChatDelta, finish_reason: Option<&str>) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            system_fingerprint: SYSTEM_FINGERPRINT.to_string(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
        }
    }

    /// Produce the next frame, or `None` once the stream is over.
    fn next_frame(&mut self) -> Option<Bytes> {
        let chunk = match self.stage {
            Stage::Role => self.chunk(
                ChatDelta {
                    role: Some("assistant".to_string()),
                    content: None,
                },
                None,
            ),
            Stage::Content => {
                let content = self.reply.take();
                self.chunk(ChatDelta { role: None, content }, None)
            }
            Stage::Finish => self.chunk(ChatDelta::default(), Some("stop")),
            Stage::Done => {
                self.stage = Stage::Closed;
                self.frames_sent += 1;
                return Some(Bytes::from_static(DONE_FRAME));
            }
            Stage::Closed => return None,
        };

        match encode_frame(&chunk) {
            Ok(frame) => {
                self.stage = match self.stage {
                    Stage::Role => Stage::Content,
                    Stage::Content => Stage::Finish,
                    _ => Stage::Done,
                };
                self.frames_sent += 1;
                Some(frame)
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode stream chunk, aborting stream");
                if let Some(span) = self.span.as_mut() {
                    span.set_attribute(Attribute::string("error", e.to_string()));
                }
                self.stage = Stage::Closed;
                None
            }
        }
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        if self.stage != Stage::Closed {
            debug!(frames_sent = self.frames_sent, "Stream dropped before completion");
        }
        if let Some(mut span) = self.span.take() {
            span.set_attribute(Attribute::int("stream.frames_sent", self.frames_sent));
            span.end();
        }
    }
}

fn chunk_stream(state: ChunkStream) -> impl Stream<Item = Result<Bytes, std::io::Error>> {
    futures_util::stream::unfold(state, |mut st| async move {
        let frame = st.next_frame()?;
        Some((Ok(frame), st))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use http_body_util::BodyExt;
    use mokku_core::{AttributeValue, ChatMessage, MessageRole, NoopTelemetry, RecordingTelemetry};
    use serde_json::Value;

    fn streaming_request(messages: Vec<ChatMessage>) -> ChatRequest {
        let mut req = ChatRequest::new("gpt-4", messages);
        req.stream = Some(true);
        req
    }

    fn untraced(req: &ChatRequest) -> Response {
        stream_chat_completion(req, &NoopTelemetry::new(), &TraceCarrier::new())
    }

    async fn frames_of(response: Response) -> Vec<String> {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.ends_with("\n\n"));
        text.split_terminator("\n\n").map(str::to_string).collect()
    }

    fn payload(frame: &str) -> Value {
        serde_json::from_str(frame.strip_prefix("data: ").unwrap()).unwrap()
    }

    #[test]
    fn test_encode_frame_is_single_line() {
        let frame = encode_frame(&serde_json::json!({"content": "a\nb"})).unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: {"));
        assert!(text.ends_with("}\n\n"));
        assert_eq!(text.matches('\n').count(), 2);
    }

    #[test]
    fn test_encode_frame_reports_serialization_errors() {
        struct Unserializable;
        impl Serialize for Unserializable {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(serde::ser::Error::custom("boom"))
            }
        }
        assert!(encode_frame(&Unserializable).is_err());
    }

    #[tokio::test]
    async fn test_headers() {
        let req = streaming_request(vec![ChatMessage::new(MessageRole::User, "Hi")]);
        let response = untraced(&req);

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONNECTION], "keep-alive");
        assert_eq!(headers["x-accel-buffering"], "no");
    }

    #[tokio::test]
    async fn test_three_chunks_then_done() {
        let req = streaming_request(vec![ChatMessage::new(MessageRole::User, "Hello there")]);
        let frames = frames_of(untraced(&req)).await;

        assert_eq!(frames.len(), 4);
        assert_eq!(frames[3], "data: [DONE]");

        let role = payload(&frames[0]);
        assert_eq!(role["object"], "chat.completion.chunk");
        assert_eq!(role["choices"][0]["delta"]["role"], "assistant");
        assert!(role["choices"][0]["delta"].get("content").is_none());
        assert!(role["choices"][0]["finish_reason"].is_null());

        let content = payload(&frames[1]);
        assert_eq!(content["choices"][0]["delta"]["content"], "Echo: Hello there");
        assert!(content["choices"][0]["finish_reason"].is_null());

        let finish = payload(&frames[2]);
        assert_eq!(finish["choices"][0]["delta"], serde_json::json!({}));
        assert_eq!(finish["choices"][0]["finish_reason"], "stop");
    }

    #[tokio::test]
    async fn test_chunks_share_id_and_created() {
        let req = streaming_request(vec![ChatMessage::new(MessageRole::User, "x")]);
        let frames = frames_of(untraced(&req)).await;

        let chunks: Vec<Value> = frames[..3].iter().map(|f| payload(f)).collect();
        let id = chunks[0]["id"].as_str().unwrap();
        assert!(id.starts_with("chatcmpl-"));
        for chunk in &chunks {
            assert_eq!(chunk["id"], id);
            assert_eq!(chunk["created"], chunks[0]["created"]);
            assert_eq!(chunk["model"], "gpt-4");
            assert_eq!(chunk["system_fingerprint"], "fp_mock");
        }
    }

    #[tokio::test]
    async fn test_no_user_message_streams_bare_prefix() {
        let req = streaming_request(vec![]);
        let frames = frames_of(untraced(&req)).await;
        assert_eq!(payload(&frames[1])["choices"][0]["delta"]["content"], "Echo: ");
    }

    #[tokio::test]
    async fn test_completed_stream_records_span() {
        let telemetry = RecordingTelemetry::new();
        let req = streaming_request(vec![ChatMessage::new(MessageRole::User, "Bye")]);
        let _ = frames_of(stream_chat_completion(&req, &telemetry, &TraceCarrier::new())).await;

        let span = telemetry.span(STREAMING_SPAN).unwrap();
        assert!(span.ended);
        assert_eq!(span.attribute("stream"), Some(&AttributeValue::Bool(true)));
        assert_eq!(span.str_attribute("response.echo_message"), Some("Echo: Bye"));
        assert_eq!(span.attribute("stream.frames_sent"), Some(&AttributeValue::Int(4)));
        assert!(span.str_attribute("request.full_json").is_some());

        let echo = telemetry.span("generateEchoResponse").unwrap();
        assert_eq!(echo.parent.as_deref(), Some(STREAMING_SPAN));
        assert!(span.remote_parent.is_none());
    }

    #[tokio::test]
    async fn test_stream_span_continues_caller_trace() {
        let telemetry = RecordingTelemetry::new();
        let traceparent = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";
        let mut parent = TraceCarrier::new();
        parent.insert("traceparent", traceparent);
        let req = streaming_request(vec![ChatMessage::new(MessageRole::User, "Bye")]);

        let _ = frames_of(stream_chat_completion(&req, &telemetry, &parent)).await;

        let span = telemetry.span(STREAMING_SPAN).unwrap();
        assert_eq!(span.remote_parent.as_deref(), Some(traceparent));
    }

    #[tokio::test]
    async fn test_dropped_stream_stops_early_and_ends_span() {
        let telemetry = RecordingTelemetry::new();
        let span = telemetry.start_span(STREAMING_SPAN);
        let mut frames = Box::pin(chunk_stream(ChunkStream::new(
            "gpt-4".into(),
            "Echo: hi".into(),
            span,
        )));

        let first = frames.next().await.unwrap().unwrap();
        assert!(first.starts_with(b"data: {"));
        drop(frames);

        let span = telemetry.span(STREAMING_SPAN).unwrap();
        assert!(span.ended);
        assert_eq!(span.attribute("stream.frames_sent"), Some(&AttributeValue::Int(1)));
    }

    #[tokio::test]
    async fn test_stream_ends_after_done() {
        let span = NoopTelemetry::new().start_span(STREAMING_SPAN);
        let frames: Vec<_> = chunk_stream(ChunkStream::new("m".into(), "r".into(), span))
            .collect()
            .await;
        assert_eq!(frames.len(), 4);
    }
}
