//! Provider-agnostic message and request/response types for LLM calls.
//!
//! These types decouple pipeline logic from any specific LLM SDK, so the
//! same reconstruction code can run against any backend a [`super::LlmProvider`]
//! implementation wraps.

use serde::{Deserialize, Serialize};

/// Role of a chat message participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Message content.
    pub content: String,
}

/// Creates a system message.
#[must_use]
pub fn system_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::System,
        content: content.to_string(),
    }
}

/// Creates a user message.
#[must_use]
pub fn user_message(content: &str) -> ChatMessage {
    ChatMessage {
        role: Role::User,
        content: content.to_string(),
    }
}

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Ordered conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Builds a request from a system prompt and a single user message.
    #[must_use]
    pub fn new(model: &str, system: &str, user: &str, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![system_message(system), user_message(user)],
            temperature: Some(0.2),
            max_tokens: Some(max_tokens),
        }
    }

    /// Appends a continuation turn (assistant's partial output, followed
    /// by a user "continue" instruction), used by the length enforcer.
    #[must_use]
    pub fn with_continuation(mut self, partial_output: &str, continue_prompt: &str) -> Self {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: partial_output.to_string(),
        });
        self.messages.push(user_message(continue_prompt));
        self
    }
}

/// Reason the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model completed its response naturally.
    EndTurn,
    /// The model hit its token budget mid-response.
    MaxTokens,
    /// Any other stop reason reported by the provider.
    Other,
}

impl StopReason {
    /// Maps a provider-reported finish-reason string onto [`StopReason`].
    #[must_use]
    pub fn from_provider_str(s: &str) -> Self {
        match s {
            "stop" | "end_turn" | "complete" => Self::EndTurn,
            "length" | "max_tokens" => Self::MaxTokens,
            _ => Self::Other,
        }
    }
}

/// A chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated text content.
    pub content: String,
    /// Why the model stopped.
    pub stop_reason: StopReason,
}
