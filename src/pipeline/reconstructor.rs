//! Chunk reconstruction: the first-pass LLM call that rewrites one source
//! chunk in light of the global skeleton and prior-chunk coherence context.

use std::sync::Arc;

use crate::core::{ChunkDelta, GlobalSkeleton};
use crate::error::{LlmError, Result};
use crate::llm::{ChatRequest, ChatResponse, LlmProvider, StopReason};
use crate::pipeline::config::PipelineConfig;

/// Outcome of the first-pass reconstruction call for one chunk.
pub struct ReconstructionOutcome {
    /// Text produced by the first-pass call.
    pub output_text: String,
    /// Structured (or synthesized) delta for the chunk.
    pub delta: ChunkDelta,
    /// Stop reason reported for the first-pass call.
    pub stop_reason: StopReason,
}

/// Runs the first-pass reconstruction call for one chunk.
///
/// Does not itself enforce the length band — callers that see an
/// under-length or truncated result hand off to
/// [`crate::pipeline::length_enforcer::enforce_length`].
///
/// # Errors
///
/// Returns an error if every transport retry is exhausted.
pub async fn reconstruct_chunk(
    provider: &Arc<dyn LlmProvider>,
    source_text: &str,
    chunk_index: usize,
    total_chunks: usize,
    skeleton: &GlobalSkeleton,
    target_words: usize,
    prior_context_summary: &str,
    config: &PipelineConfig,
) -> Result<ReconstructionOutcome> {
    let prompt = build_prompt(
        source_text,
        chunk_index,
        total_chunks,
        skeleton,
        target_words,
        prior_context_summary,
    );

    let mut last_err = None;
    for attempt in 0..=config.chunk_retries {
        let request = ChatRequest::new(
            &config.model,
            RECONSTRUCTOR_SYSTEM_PROMPT,
            &prompt,
            (target_words as u32) * 2,
        );
        match provider.chat(&request).await {
            Ok(response) => return Ok(finish(response)),
            Err(e) => last_err = Some(e),
        }
        if attempt < config.chunk_retries {
            tokio::time::sleep(std::time::Duration::from_secs(2u64.pow(attempt + 1))).await;
        }
    }

    Err(last_err.unwrap_or_else(|| LlmError::Transport("chunk reconstruction exhausted retries".into()).into()))
}

fn finish(response: ChatResponse) -> ReconstructionOutcome {
    let delta = parse_delta(&response.content).unwrap_or_else(|| {
        ChunkDelta::synthesize_from_text(&response.content)
    });
    ReconstructionOutcome {
        output_text: strip_delta_block(&response.content),
        delta,
        stop_reason: response.stop_reason,
    }
}

const RECONSTRUCTOR_SYSTEM_PROMPT: &str = "You rewrite one chunk of a larger \
document so it fits a global outline and stays consistent with material \
already written. After the rewritten text, on its own line, emit \
`<<<DELTA>>>` followed by a JSON object {\"claims_introduced\", \
\"terms_introduced\", \"conflicts\", \"summary\"} describing what this \
chunk newly established.";

fn build_prompt(
    source_text: &str,
    chunk_index: usize,
    total_chunks: usize,
    skeleton: &GlobalSkeleton,
    target_words: usize,
    prior_context_summary: &str,
) -> String {
    let outline: String = skeleton
        .sections
        .iter()
        .map(|s| format!("- [{}] {} (target {} words)", s.id, s.title, s.target_words))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "GLOBAL OUTLINE:\n{outline}\n\n\
         {prior_context_summary}\n\n\
         CHUNK {}/{} SOURCE TEXT:\n{source_text}\n\n\
         Rewrite this chunk to approximately {target_words} words, \
         consistent with the outline and the prior coherence context.",
        chunk_index + 1,
        total_chunks,
    )
}

/// Splits the model's `<<<DELTA>>>`-delimited JSON block from the prose
/// output text, returning only the prose.
fn strip_delta_block(content: &str) -> String {
    content
        .split("<<<DELTA>>>")
        .next()
        .unwrap_or(content)
        .trim()
        .to_string()
}

/// Parses the structured delta block, if present and well-formed.
fn parse_delta(content: &str) -> Option<ChunkDelta> {
    let (_, json_part) = content.split_once("<<<DELTA>>>")?;
    let trimmed = json_part.trim();
    let json_str = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };
    serde_json::from_str::<ChunkDelta>(json_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SkeletonSection;
    use crate::length::count_words;
    use crate::llm::StubLlmProvider;

    fn skeleton() -> GlobalSkeleton {
        GlobalSkeleton {
            sections: vec![SkeletonSection {
                id: 0,
                title: "Intro".into(),
                claims: vec![],
                target_words: 500,
                terms: vec![],
                related_section_ids: vec![],
            }],
        }
    }

    #[test]
    fn test_strip_delta_block_removes_json_tail() {
        let content = "Some prose.\n<<<DELTA>>>\n{\"claims_introduced\":[]}";
        assert_eq!(strip_delta_block(content), "Some prose.");
    }

    #[test]
    fn test_parse_delta_valid_json() {
        let content = "prose\n<<<DELTA>>>\n{\"claims_introduced\":[\"a\"],\"terms_introduced\":[],\"conflicts\":[],\"summary\":\"s\"}";
        let delta = parse_delta(content).unwrap();
        assert_eq!(delta.claims_introduced, vec!["a"]);
    }

    #[test]
    fn test_parse_delta_missing_block_returns_none() {
        assert!(parse_delta("no delta block here").is_none());
    }

    #[tokio::test]
    async fn test_reconstruct_chunk_synthesizes_delta_when_absent() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::default());
        let config = PipelineConfig::default();
        let outcome = reconstruct_chunk(
            &provider,
            "source text",
            0,
            1,
            &skeleton(),
            100,
            "",
            &config,
        )
        .await
        .unwrap();
        assert!(count_words(&outcome.output_text) > 0);
        assert_eq!(outcome.stop_reason, StopReason::EndTurn);
    }
}
