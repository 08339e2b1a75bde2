//! Request shapes accepted by the mock API.
//!
//! Every generation parameter is an `Option`, so a parameter the client never
//! sent stays distinguishable from one sent as `0` or `false`.

mod chat;
mod completion;

pub use chat::{ChatMessage, ChatRequest, MessageRole};
pub use completion::{CompletionRequest, Prompt};

use serde::{Deserialize, Serialize};

/// Stop sequences: OpenAI accepts a single string or a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl StopSequences {
    /// All sequences, regardless of which shape was sent.
    pub fn sequences(&self) -> Vec<&str> {
        match self {
            Self::One(s) => vec![s.as_str()],
            Self::Many(list) => list.iter().map(String::as_str).collect(),
        }
    }
}
