//! Legacy text completion request types.

use serde::{Deserialize, Serialize};

use super::StopSequences;
use crate::ports::Attribute;

/// The `prompt` field: either one string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    List(Vec<String>),
}

impl Prompt {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Text(_) => None,
            Self::List(list) => Some(list),
        }
    }

    /// The prompt text to echo: the string itself, or the first list element.
    /// An empty list resolves to `""`.
    pub fn resolve(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::List(list) => list.first().map_or("", String::as_str),
        }
    }

    /// Number of prompts carried.
    pub fn len(&self) -> usize {
        match self {
            Self::Text(_) => 1,
            Self::List(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Prompt {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Request body of `POST /v1/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    #[serde(default)]
    pub prompt: Prompt,
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
    pub echo: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_of: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: Prompt) -> Self {
        Self {
            model: model.into(),
            prompt,
            temperature: None,
            top_p: None,
            n: None,
            stream: None,
            stop: None,
            max_tokens: None,
            echo: None,
            presence_penalty: None,
            frequency_penalty: None,
            best_of: None,
            user: None,
            seed: None,
        }
    }

    /// Span attributes summarizing this request.
    pub fn telemetry_attributes(&self) -> Vec<Attribute> {
        let mut attrs = vec![
            Attribute::string("model", self.model.clone()),
            Attribute::int(
                "prompt_count",
                i64::try_from(self.prompt.len()).unwrap_or(i64::MAX),
            ),
            Attribute::string("prompt", self.prompt.resolve()),
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
        if let Some(v) = self.echo {
            attrs.push(Attribute::bool("echo", v));
        }
        if let Some(v) = self.presence_penalty {
            attrs.push(Attribute::float("presence_penalty", v));
        }
        if let Some(v) = self.frequency_penalty {
            attrs.push(Attribute::float("frequency_penalty", v));
        }
        if let Some(v) = self.best_of {
            attrs.push(Attribute::int("best_of", i64::from(v)));
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
