//! Chat completion request types.

use serde::{Deserialize, Serialize};

use super::StopSequences;
use crate::ports::Attribute;

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    /// Convert role to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Request body of `POST /v1/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model name as sent by the client; never validated.
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<StopSequences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl ChatRequest {
    /// Minimal request with every optional parameter unset.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            n: None,
            stream: None,
            stop: None,
            max_tokens: None,
            max_completion_tokens: None,
            presence_penalty: None,
            frequency_penalty: None,
            user: None,
            seed: None,
        }
    }

    /// Content of the user message closest to the end of the conversation.
    ///
    /// Returns `""` when no user message exists, including for an empty list.
    pub fn last_user_message(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map_or("", |m| m.content.as_str())
    }

    /// True only when `stream` was sent and is `true`.
    pub fn wants_stream(&self) -> bool {
        self.stream == Some(true)
    }

    /// Span attributes summarizing this request.
    ///
    /// Always carries `model`, `message_count` and `last_user_message`;
    /// optional parameters are included only when the client sent them.
    pub fn telemetry_attributes(&self) -> Vec<Attribute> {
        let mut attrs = vec![
            Attribute::string("model", self.model.clone()),
            Attribute::int(
                "message_count",
                i64::try_from(self.messages.len()).unwrap_or(i64::MAX),
            ),
            Attribute::string("last_user_message", self.last_user_message()),
        ];

        if let Some(v) = self.temperature {
            attrs.push(Attribute::float("temperature", v));
        }
        if let Some(v) = self.top_p {
            attrs.push(Attribute::float("top_p", v));
        }
        if let Some(v) = self.n {
            attrs.push(Attribute::int("n", i64::from(v)));
        }
        if let Some(v) = self.stream {
            attrs.push(Attribute::bool("stream", v));
        }
        if let Some(stop) = &self.stop {
            attrs.push(Attribute::string("stop", stop.sequences().join(",")));
        }
        if let Some(v) = self.max_tokens {
            attrs.push(Attribute::int("max_tokens", i64::from(v)));
        }
        if let Some(v) = self.max_completion_tokens {
            attrs.push(Attribute::int("max_completion_tokens", i64::from(v)));
        }
        if let Some(v) = self.presence_penalty {
            attrs.push(Attribute::float("presence_penalty", v));
        }
        if let Some(v) = self.frequency_penalty {
            attrs.push(Attribute::float("frequency_penalty", v));
        }
        if let Some(v) = &self.user {
            attrs.push(Attribute::string("user", v.clone()));
        }
        if let Some(v) = self.seed {
            attrs.push(Attribute::int("seed", v));
        }

        attrs
    }
}
