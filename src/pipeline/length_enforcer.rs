//! Length enforcement: the continuation loop that brings an under-length
//! or truncated chunk reconstruction up to its target word band.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::ChunkStatus;
use crate::error::Result;
use crate::length::count_words;
use crate::llm::{ChatRequest, LlmProvider, StopReason};
use crate::pipeline::config::PipelineConfig;

/// Fraction of target word count that counts as "essentially complete".
const SUCCESS_RATIO: f64 = 0.95;
/// Ceiling on the per-continuation word request.
const MAX_CONTINUATION_WORDS: usize = 4_000;
/// Number of trailing paragraphs echoed verbatim in a continuation prompt.
const CONTEXT_PARAGRAPHS: usize = 3;

/// Result of running the continuation loop to completion.
pub struct EnforcementResult {
    /// Final concatenated output text.
    pub output_text: String,
    /// Total word count of `output_text`.
    pub word_count: usize,
    /// Number of continuation attempts consumed (0 if no continuation ran).
    pub attempts: u32,
    /// Resulting chunk status: `Complete` on success/partial success,
    /// `Flagged` on hard failure after the attempt cap.
    pub status: ChunkStatus,
}

/// Runs the continuation loop for a chunk whose first-pass output fell
/// short of its target or was truncated mid-sentence.
///
/// # Errors
///
/// Returns an error if a continuation call exhausts transport retries.
#[allow(clippy::too_many_arguments)]
pub async fn enforce_length(
    provider: &Arc<dyn LlmProvider>,
    model: &str,
    mut output_text: String,
    mut last_stop_reason: StopReason,
    min_words: usize,
    target_words: usize,
    config: &PipelineConfig,
) -> Result<EnforcementResult> {
    let mut attempts = 0u32;
    let mut word_count = count_words(&output_text);

    loop {
        let under_budget = (word_count as f64) < SUCCESS_RATIO * target_words as f64;
        let forced = last_stop_reason == StopReason::MaxTokens;
        if !(under_budget || forced) {
            break;
        }
        if attempts >= config.max_continuation_attempts {
            warn!(attempts, word_count, target_words, "continuation cap reached");
            break;
        }

        let remaining = target_words.saturating_sub(word_count);
        let request_words = remaining.clamp(1, MAX_CONTINUATION_WORDS);
        let continue_prompt = build_continuation_prompt(&output_text, request_words);

        let request = ChatRequest::new(model, CONTINUATION_SYSTEM_PROMPT, &continue_prompt, (request_words as u32) * 2);
        let response = provider.chat(&request).await?;

        if !output_text.is_empty() {
            output_text.push_str("\n\n");
        }
        output_text.push_str(response.content.trim());
        word_count = count_words(&output_text);
        last_stop_reason = response.stop_reason;
        attempts += 1;

        tokio::time::sleep(config.continuation_pause).await;
    }

    let status = if word_count >= min_words {
        ChunkStatus::Complete
    } else {
        ChunkStatus::Flagged
    };
    debug!(attempts, word_count, ?status, "length enforcement finished");

    Ok(EnforcementResult {
        output_text,
        word_count,
        attempts,
        status,
    })
}

const CONTINUATION_SYSTEM_PROMPT: &str = "Continue the passage below. Do \
not repeat prior content and do not prematurely conclude unless you are \
within 4000 words of the requested length.";

fn build_continuation_prompt(output_so_far: &str, request_words: usize) -> String {
    let tail = last_paragraphs(output_so_far, CONTEXT_PARAGRAPHS);
    format!(
        "PRIOR TEXT (verbatim tail):\n{tail}\n\n\
         Continue from here with approximately {request_words} more words."
    )
}

fn last_paragraphs(text: &str, n: usize) -> String {
    let paragraphs: Vec<&str> = text.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
    let start = paragraphs.len().saturating_sub(n);
    paragraphs[start..].join("\n\n")
}

/// Pause used between sequential chunks to smooth provider throttling,
/// sampled uniformly within `[config.chunk_pause_min, config.chunk_pause_max]`.
///
/// Uses a simple time-based pseudo-jitter (no `rand` dependency) since the
/// exact pause length is explicitly non-correctness-critical.
#[must_use]
pub fn inter_chunk_pause(config: &PipelineConfig, chunk_index: usize) -> Duration {
    let min = config.chunk_pause_min.as_millis() as u64;
    let max = config.chunk_pause_max.as_millis() as u64;
    if max <= min {
        return config.chunk_pause_min;
    }
    let span = max - min;
    let jitter = (chunk_index as u64).wrapping_mul(2_654_435_761) % span;
    Duration::from_millis(min + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLlmProvider;

    #[tokio::test]
    async fn test_enforce_length_no_continuation_needed() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::default());
        let config = PipelineConfig::default();
        let text = "word ".repeat(1000);
        let result = enforce_length(
            &provider,
            "model",
            text,
            StopReason::EndTurn,
            850,
            1000,
            &config,
        )
        .await
        .unwrap();
        assert_eq!(result.attempts, 0);
        assert_eq!(result.status, ChunkStatus::Complete);
    }

    #[tokio::test]
    async fn test_enforce_length_continues_until_target() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::with_fill_fraction(1.0));
        let config = PipelineConfig::default();
        let short = "word ".repeat(100);
        let result = enforce_length(
            &provider,
            "model",
            short,
            StopReason::EndTurn,
            850,
            1000,
            &config,
        )
        .await
        .unwrap();
        assert!(result.attempts > 0);
        assert!(result.word_count as f64 >= 0.95 * 1000.0);
        assert_eq!(result.status, ChunkStatus::Complete);
    }

    #[tokio::test]
    async fn test_enforce_length_forced_continuation_on_max_tokens() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::with_fill_fraction(0.01));
        let config = PipelineConfig::default();
        let text = "word ".repeat(1000);
        let result = enforce_length(
            &provider,
            "model",
            text,
            StopReason::MaxTokens,
            850,
            1000,
            &config,
        )
        .await
        .unwrap();
        assert!(result.attempts >= 1);
    }

    #[tokio::test]
    async fn test_enforce_length_hard_failure_flags_chunk() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::with_fill_fraction(0.01));
        let mut config = PipelineConfig::default();
        config.max_continuation_attempts = 2;
        config.continuation_pause = Duration::from_millis(1);
        let short = "word ".repeat(10);
        let result = enforce_length(
            &provider,
            "model",
            short,
            StopReason::EndTurn,
            850,
            1000,
            &config,
        )
        .await
        .unwrap();
        assert_eq!(result.attempts, 2);
        assert_eq!(result.status, ChunkStatus::Flagged);
    }

    #[test]
    fn test_inter_chunk_pause_within_bounds() {
        let config = PipelineConfig::default();
        for i in 0..20 {
            let pause = inter_chunk_pause(&config, i);
            assert!(pause >= config.chunk_pause_min);
            assert!(pause <= config.chunk_pause_max);
        }
    }
}
