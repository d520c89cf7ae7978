//! Stitching: the best-effort global validation pass run once after the
//! last chunk completes.

use std::sync::Arc;

use tracing::warn;

use crate::core::{ChunkRecord, GlobalSkeleton, StitchResult};
use crate::llm::{ChatRequest, LlmProvider};
use crate::pipeline::config::PipelineConfig;

/// Concatenates chunk outputs with paragraph separators, deduplicating an
/// inter-chunk transition boilerplate phrase when it repeats verbatim at a
/// chunk boundary.
#[must_use]
pub fn concatenate(chunks: &[ChunkRecord]) -> String {
    let mut out = String::new();
    let mut last_line: Option<String> = None;
    for chunk in chunks {
        let Some(text) = &chunk.output_text else { continue };
        let text = text.trim();
        let first_line = text.lines().next().unwrap_or_default().trim();
        let deduped = if last_line.as_deref() == Some(first_line) && !first_line.is_empty() {
            text.splitn(2, '\n').nth(1).unwrap_or("").trim()
        } else {
            text
        };
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(deduped);
        last_line = text.lines().last().map(str::trim).map(str::to_string);
    }
    out
}

/// Runs the stitcher's global coherence pass.
///
/// Best-effort: if the validation LLM call fails or returns something
/// unparsable, the concatenated output is still returned with a
/// conservative [`crate::core::StitchVerdict::MinorIssues`] annotation
/// rather than failing the job.
pub async fn run_stitch(
    provider: &Arc<dyn LlmProvider>,
    job_id: &str,
    skeleton: &GlobalSkeleton,
    chunks: &[ChunkRecord],
    config: &PipelineConfig,
) -> StitchResult {
    let final_output = concatenate(chunks);

    match validate(provider, skeleton, chunks, config).await {
        Ok(v) => StitchResult::new(
            job_id.to_string(),
            v.conflicts,
            v.term_drift,
            v.missing_premises,
            v.redundancies,
            v.repair_plan,
            v.coherence_score,
            final_output,
        ),
        Err(e) => {
            warn!(job_id, error = %e, "stitch validation failed, emitting unvalidated output");
            StitchResult::new(
                job_id.to_string(),
                vec![],
                vec![],
                vec![],
                vec![],
                vec!["stitch validation unavailable".to_string()],
                0.75,
                final_output,
            )
        }
    }
}

struct ValidationOutput {
    conflicts: Vec<String>,
    term_drift: Vec<String>,
    missing_premises: Vec<String>,
    redundancies: Vec<String>,
    repair_plan: Vec<String>,
    coherence_score: f32,
}

async fn validate(
    provider: &Arc<dyn LlmProvider>,
    skeleton: &GlobalSkeleton,
    chunks: &[ChunkRecord],
    config: &PipelineConfig,
) -> crate::error::Result<ValidationOutput> {
    let summaries: String = chunks
        .iter()
        .filter_map(|c| c.chunk_delta.as_ref().map(|d| format!("- {}", d.summary)))
        .collect::<Vec<_>>()
        .join("\n");
    let outline: String = skeleton
        .sections
        .iter()
        .map(|s| format!("- {}", s.title))
        .collect::<Vec<_>>()
        .join("\n");

    let prompt = format!(
        "OUTLINE:\n{outline}\n\nCHUNK SUMMARIES:\n{summaries}\n\n\
         Identify cross-chunk conflicts, term drift, missing premises, and \
         redundancies. Respond as JSON: {{\"conflicts\", \"term_drift\", \
         \"missing_premises\", \"redundancies\", \"repair_plan\", \
         \"coherence_score\"}} with coherence_score in [0,1]."
    );
    let request = ChatRequest::new(&config.model, STITCH_SYSTEM_PROMPT, &prompt, 1024);
    let response = provider.chat(&request).await?;
    parse_validation(&response.content)
}

const STITCH_SYSTEM_PROMPT: &str =
    "You audit a multi-chunk document for cross-chunk consistency and reply with JSON only.";

fn parse_validation(content: &str) -> crate::error::Result<ValidationOutput> {
    let trimmed = content.trim();
    let json_str = trimmed
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    let value: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
        crate::error::LlmError::MalformedResponse {
            message: e.to_string(),
            content: content.to_string(),
        }
    })?;

    let strings = |key: &str| -> Vec<String> {
        value
            .get(key)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };

    Ok(ValidationOutput {
        conflicts: strings("conflicts"),
        term_drift: strings("term_drift"),
        missing_premises: strings("missing_premises"),
        redundancies: strings("redundancies"),
        repair_plan: strings("repair_plan"),
        coherence_score: value
            .get("coherence_score")
            .and_then(serde_json::Value::as_f64)
            .map_or(0.8, |v| v as f32),
    })
}
