//! One-shot global skeleton extraction.
//!
//! Runs before chunk processing begins: a single LLM call over the full
//! source text plus the parsed directive structure, producing the
//! [`GlobalSkeleton`] every chunk reconstruction call is measured against.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::core::{GlobalSkeleton, SkeletonSection};
use crate::directive::DirectivePlan;
use crate::error::{LlmError, Result};
use crate::length::LengthConfig;
use crate::llm::{ChatRequest, LlmProvider};
use crate::pipeline::config::PipelineConfig;

/// Base backoff delay before the first retry.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
/// Maximum backoff delay between retries.
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Extracts the job-wide [`GlobalSkeleton`], retrying on transport error or
/// a malformed response up to `config.skeleton_retries` times with
/// exponential backoff.
///
/// # Errors
///
/// Returns the last transport/parse error once retries are exhausted.
pub async fn extract_skeleton(
    provider: &Arc<dyn LlmProvider>,
    source_text: &str,
    directive: &DirectivePlan,
    length_config: &LengthConfig,
    config: &PipelineConfig,
) -> Result<GlobalSkeleton> {
    let prompt = build_prompt(source_text, directive, length_config);
    let mut delay = BACKOFF_BASE;
    let mut last_err = None;

    for attempt in 0..=config.skeleton_retries {
        let request = ChatRequest::new(
            &config.model,
            SKELETON_SYSTEM_PROMPT,
            &prompt,
            length_config.target as u32 / 2 + 512,
        );

        match provider.chat(&request).await {
            Ok(response) => match parse_skeleton(&response.content) {
                Ok(skeleton) if !skeleton.is_malformed() => {
                    debug!(attempt, sections = skeleton.sections.len(), "skeleton extracted");
                    return Ok(skeleton);
                }
                Ok(_) => {
                    warn!(attempt, "skeleton malformed, retrying");
                    last_err = Some(LlmError::MalformedResponse {
                        message: "skeleton missing required sections".to_string(),
                        content: response.content,
                    });
                }
                Err(e) => {
                    warn!(attempt, error = %e, "skeleton parse failed, retrying");
                    last_err = Some(LlmError::MalformedResponse {
                        message: e.to_string(),
                        content: response.content,
                    });
                }
            },
            Err(e) => {
                warn!(attempt, error = %e, "skeleton transport error, retrying");
                last_err = Some(LlmError::Transport(e.to_string()));
            }
        }

        if attempt < config.skeleton_retries {
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(BACKOFF_CAP);
        }
    }

    Err(last_err.unwrap_or(LlmError::Transport("skeleton extraction exhausted retries".into())).into())
}

const SKELETON_SYSTEM_PROMPT: &str = "You produce a JSON document outline. \
Respond with a JSON object {\"sections\": [{\"id\", \"title\", \"claims\", \
\"target_words\", \"terms\", \"related_section_ids\"}]} and nothing else.";

fn build_prompt(source_text: &str, directive: &DirectivePlan, length_config: &LengthConfig) -> String {
    let structure = if directive.structure.is_empty() {
        "No explicit structure requested; infer a sensible outline.".to_string()
    } else {
        directive
            .structure
            .iter()
            .map(|s| format!("- {} (target words: {})", s.name, s.word_count))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "SOURCE TEXT:\n{source_text}\n\n\
         REQUESTED STRUCTURE:\n{structure}\n\n\
         TOTAL TARGET WORDS: {}\n\n\
         Produce a section-by-section outline covering the source material, \
         assigning each section a stable integer id, a title, key claims it \
         must establish, a target word count, domain terms it introduces, \
         and the ids of related sections.",
        length_config.target
    )
}

/// Parses a skeleton response, tolerating a bare array of sections, a
/// `{"sections": [...]}` wrapper, or markdown code fences around either.
fn parse_skeleton(content: &str) -> Result<GlobalSkeleton> {
    let trimmed = content.trim();
    let json_str = if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    };

    if let Ok(skeleton) = serde_json::from_str::<GlobalSkeleton>(json_str) {
        return Ok(skeleton);
    }
    if let Ok(sections) = serde_json::from_str::<Vec<SkeletonSection>>(json_str) {
        return Ok(GlobalSkeleton { sections });
    }

    Err(LlmError::MalformedResponse {
        message: "could not parse skeleton JSON".to_string(),
        content: content.to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive;
    use crate::length::calculate_length_config;
    use crate::llm::StubLlmProvider;

    fn stub_skeleton_json() -> String {
        r#"{"sections":[{"id":0,"title":"Introduction","claims":["intro claim"],
        "target_words":500,"terms":["term"],"related_section_ids":[]}]}"#
            .to_string()
    }

    #[test]
    fn test_parse_skeleton_wrapper_object() {
        let skeleton = parse_skeleton(&stub_skeleton_json()).unwrap();
        assert_eq!(skeleton.sections.len(), 1);
    }

    #[test]
    fn test_parse_skeleton_with_code_fence() {
        let fenced = format!("```json\n{}\n```", stub_skeleton_json());
        let skeleton = parse_skeleton(&fenced).unwrap();
        assert_eq!(skeleton.sections.len(), 1);
    }

    #[test]
    fn test_parse_skeleton_garbage_errors() {
        assert!(parse_skeleton("not json at all").is_err());
    }

    #[tokio::test]
    async fn test_extract_skeleton_retries_on_malformed_then_succeeds() {
        struct FlakyProvider {
            calls: std::sync::atomic::AtomicUsize,
        }
        #[async_trait::async_trait]
        impl LlmProvider for FlakyProvider {
            fn name(&self) -> &'static str {
                "flaky"
            }
            async fn chat(
                &self,
                _request: &ChatRequest,
            ) -> Result<crate::llm::ChatResponse> {
                let n = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let content = if n == 0 {
                    "{}".to_string()
                } else {
                    stub_skeleton_json()
                };
                Ok(crate::llm::ChatResponse {
                    content,
                    stop_reason: crate::llm::StopReason::EndTurn,
                })
            }
        }

        let provider: Arc<dyn LlmProvider> = Arc::new(FlakyProvider {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let directive = directive::parse("");
        let length_config = calculate_length_config("", 3000, 3);
        let config = PipelineConfig::default();
        let skeleton = extract_skeleton(&provider, "source", &directive, &length_config, &config)
            .await
            .unwrap();
        assert_eq!(skeleton.sections.len(), 1);
    }

    #[tokio::test]
    async fn test_extract_skeleton_fails_after_retries_exhausted() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::default());
        let directive = directive::parse("");
        let length_config = calculate_length_config("", 3000, 3);
        let mut config = PipelineConfig::default();
        config.skeleton_retries = 1;
        let result = extract_skeleton(&provider, "source", &directive, &length_config, &config).await;
        assert!(result.is_err());
    }
}
