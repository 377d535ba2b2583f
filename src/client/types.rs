//! Wire types for the chat completions endpoint.

use serde::{Deserialize, Serialize};

/// A single message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Message {
    /// `system`, `user` or `assistant`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Create a message with an arbitrary role.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// A `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    /// A `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// An `assistant` message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }
}

/// Request body for `/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct ChatCompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation so far.
    pub messages: Vec<Message>,
    /// Sampling temperature; omitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Reasoning effort hint; omitted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Whether the response is streamed. Set by the client.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Create a request for `model` with the given messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    /// Set the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the reasoning effort hint.
    #[must_use]
    pub fn with_reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.reasoning_effort = Some(effort.into());
        self
    }
}

/// Token accounting returned with non-streaming responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Sum of both.
    pub total_tokens: u32,
}

/// One choice of a non-streaming response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct Choice {
    /// Position among the choices.
    pub index: u32,
    /// The full generated message.
    pub message: Message,
    /// Why generation stopped.
    pub finish_reason: Option<String>,
}

/// Non-streaming response body.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct ChatCompletionResponse {
    /// Response identifier.
    pub id: String,
    /// Object type tag.
    pub object: String,
    /// Unix creation time.
    pub created: i64,
    /// Model that produced the response.
    pub model: String,
    /// Generated choices.
    pub choices: Vec<Choice>,
    /// Token accounting.
    pub usage: Usage,
}

/// Incremental message content carried by a stream chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct Delta {
    /// Present on the first chunk of a message.
    pub role: Option<String>,
    /// Newly generated text, if any.
    pub content: Option<String>,
}

/// One choice of a stream chunk.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct ChunkChoice {
    /// Position among the choices.
    pub index: u32,
    /// The increment.
    pub delta: Delta,
    /// Set on the final chunk of a choice.
    pub finish_reason: Option<String>,
}

/// A single `data:` record of the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct ChatCompletionChunk {
    /// Response identifier (shared by all chunks of a response).
    pub id: String,
    /// Object type tag.
    pub object: String,
    /// Unix creation time.
    pub created: i64,
    /// Model producing the stream.
    pub model: String,
    /// Increments, usually exactly one.
    pub choices: Vec<ChunkChoice>,
}

impl ChatCompletionChunk {
    /// Text of the first choice's delta, or `""` when there is none.
    pub fn delta_text(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
            .unwrap_or("")
    }
}
