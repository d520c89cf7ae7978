//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls. Pipeline components depend only on
//! this trait, so swapping the backing model or vendor never touches
//! reconstruction logic.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, Role, StopReason};
use crate::error::{LlmError, Result};
use crate::length::count_words;

/// Substring of the skeleton extractor's system prompt used to recognize
/// a skeleton-extraction call and answer it with valid outline JSON
/// instead of filler text — a skeleton response the parser rejects would
/// fail every job, unlike a chunk's filler text, which is always
/// acceptable output.
const SKELETON_PROMPT_MARKER: &str = "JSON document outline";

/// Trait for LLM provider backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries,
/// timeouts) for a specific provider while presenting a uniform interface
/// to the pipeline.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., `"anthropic"`, `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, timeout, or a response the
    /// provider flags as malformed.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
}

/// Deterministic test double used throughout the pipeline's unit and
/// integration tests in place of a real network-backed provider.
///
/// Produces output text by repeating a filler sentence until it reaches
/// a configurable fraction of the request's `max_tokens` (interpreted as
/// a word budget for simplicity), then reports a scripted stop reason.
#[derive(Debug, Clone)]
pub struct StubLlmProvider {
    /// Fraction of `max_tokens` worth of words to emit per call.
    pub fill_fraction: f64,
    /// Stop reason to report for every call.
    pub stop_reason: StopReason,
}

impl Default for StubLlmProvider {
    fn default() -> Self {
        Self {
            fill_fraction: 1.0,
            stop_reason: StopReason::EndTurn,
        }
    }
}

impl StubLlmProvider {
    /// Creates a stub that fills `fraction` of the requested token budget.
    #[must_use]
    pub fn with_fill_fraction(fraction: f64) -> Self {
        Self {
            fill_fraction: fraction,
            ..Self::default()
        }
    }

    /// Creates a stub that always reports `reason` as the stop reason.
    #[must_use]
    pub fn with_stop_reason(reason: StopReason) -> Self {
        Self {
            stop_reason: reason,
            ..Self::default()
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let is_skeleton_call = request
            .messages
            .iter()
            .any(|m| m.role == Role::System && m.content.contains(SKELETON_PROMPT_MARKER));
        if is_skeleton_call {
            return Ok(ChatResponse {
                content: stub_skeleton_json(),
                stop_reason: self.stop_reason,
            });
        }

        let budget = request.max_tokens.unwrap_or(500) as f64;
        let target_words = (budget * self.fill_fraction).round().max(1.0) as usize;

        let mut content = String::new();
        while count_words(&content) < target_words {
            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str("The reconstructed passage continues here with additional detail.");
        }

        if content.trim().is_empty() {
            return Err(LlmError::MalformedResponse {
                message: "stub produced empty content".to_string(),
                content: String::new(),
            }
            .into());
        }

        Ok(ChatResponse {
            content,
            stop_reason: self.stop_reason,
        })
    }
}

/// Builds a single well-formed outline section, since the stub has no
/// real understanding of the source text to outline from.
fn stub_skeleton_json() -> String {
    serde_json::json!({
        "sections": [{
            "id": 0,
            "title": "Reconstructed Document",
            "claims": ["placeholder claim"],
            "target_words": 500,
            "terms": [],
            "related_section_ids": [],
        }]
    })
    .to_string()
}
