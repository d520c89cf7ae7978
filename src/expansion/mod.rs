//! Universal Expansion Engine: turns a free-text directive into a section
//! plan and drives the same job controller machinery per section instead
//! of per source-chunk.
//!
//! This is a thin adapter over the directive parser and the job
//! controller rather than a parallel pipeline: a planned section becomes
//! a [`ChunkRecord`] whose "source text" is the section's brief, and
//! [`run_expansion`] is [`controller::run_job`] under a name that reads
//! correctly at the call site.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::core::{ChunkRecord, Job};
use crate::directive::{self, DirectivePlan};
use crate::error::{PipelineError, Result};
use crate::length::{length_band, LengthConfig, LengthMode, CHUNK_TARGET_FLOOR, DEFAULT_TARGET_WORDS};
use crate::llm::LlmProvider;
use crate::pipeline::{controller, JobRegistry, PipelineConfig, PipelineEvent, RunOutcome};
use crate::storage::Storage;

/// One planned section of a generated document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPlan {
    /// Section title, as named in the instruction.
    pub title: String,
    /// Target word count resolved for this section.
    pub target_words: usize,
}

/// Synthesizes a section plan from a free-text directive.
///
/// Sections named with an explicit word count keep it as-is. Sections
/// named without one share whatever budget remains after the explicit
/// allocations are subtracted from the overall target, split evenly
/// across them regardless of whether that remainder is already
/// exhausted — an instruction with more sections than budget still
/// produces a plan, just one with thin sections, rather than failing.
/// An instruction with no `sections:`/`chapters:`/`parts:` directive at
/// all produces a single section spanning the whole target.
#[must_use]
pub fn plan_sections(instruction: &str) -> (DirectivePlan, Vec<SectionPlan>) {
    let plan = directive::parse(instruction);
    let target = plan.target_word_count.unwrap_or(DEFAULT_TARGET_WORDS);

    if plan.structure.is_empty() {
        let sections = vec![SectionPlan {
            title: "Document".to_string(),
            target_words: target,
        }];
        return (plan, sections);
    }

    let explicit_total: usize = plan.structure.iter().map(|s| s.word_count).sum();
    let unassigned_count = plan.structure.iter().filter(|s| s.word_count == 0).count();
    let remaining = target.saturating_sub(explicit_total);
    let share = if unassigned_count > 0 { remaining / unassigned_count } else { 0 };

    let sections = plan
        .structure
        .iter()
        .map(|section| SectionPlan {
            title: section.name.clone(),
            target_words: if section.word_count == 0 { share } else { section.word_count },
        })
        .collect();

    (plan, sections)
}

/// Builds an expansion job and its per-section chunk rows, ready to be
/// persisted and driven by [`run_expansion`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptySectionPlan`] if the directive yields no
/// sections to generate, which cannot happen through [`plan_sections`]
/// today but guards against a future planning strategy that can.
pub fn prepare_expansion_job(id: String, instruction: String) -> Result<(Job, Vec<ChunkRecord>)> {
    let (directive_plan, sections) = plan_sections(&instruction);
    if sections.is_empty() {
        return Err(PipelineError::EmptySectionPlan { job_id: id }.into());
    }

    let target: usize = sections.iter().map(|s| s.target_words).sum();
    let chunk_target = (target / sections.len()).max(CHUNK_TARGET_FLOOR);
    let length_config = LengthConfig {
        target,
        ratio: 1.0,
        mode: LengthMode::Expand,
        chunk_target,
        num_chunks: sections.len(),
    };

    let mut job = Job::new(id, instruction.clone(), instruction, directive_plan, length_config.clone());
    job.total_chunks = sections.len();

    let chunks = sections
        .iter()
        .enumerate()
        .map(|(index, section)| {
            let (min, max) = length_band(section.target_words.max(CHUNK_TARGET_FLOOR));
            ChunkRecord::new(job.id.clone(), index, section.title.clone(), section.target_words.max(CHUNK_TARGET_FLOOR), min, max)
        })
        .collect();

    Ok((job, chunks))
}

/// Runs an expansion job to completion, identically to a reconstruction
/// job — the section plan already shaped it into the same `Job` /
/// `ChunkRecord` rows the controller drives for source-text chunks.
///
/// # Errors
///
/// See [`controller::run_job`].
pub async fn run_expansion(
    storage: &mut dyn Storage,
    provider: &Arc<dyn LlmProvider>,
    registry: &JobRegistry,
    events: &broadcast::Sender<PipelineEvent>,
    plan_id: &str,
    config: &PipelineConfig,
) -> Result<RunOutcome> {
    controller::run_job(storage, provider, registry, events, plan_id, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_sections_without_structure_directive_yields_one_section() {
        let (_, sections) = plan_sections("expand this to 4000 words");
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].target_words, 4_000);
    }

    #[test]
    fn test_plan_sections_distributes_remaining_budget_uniformly() {
        let (_, sections) =
            plan_sections("expand to 10000 words with sections: introduction, body, conclusion (2000 words)");
        assert_eq!(sections.len(), 3);
        let conclusion = sections.iter().find(|s| s.title.to_lowercase().contains("conclusion")).unwrap();
        assert_eq!(conclusion.target_words, 2_000);
        let remaining_share = (10_000 - 2_000) / 2;
        for section in &sections {
            if section.title.to_lowercase().contains("conclusion") {
                continue;
            }
            assert_eq!(section.target_words, remaining_share);
        }
    }

    #[test]
    fn test_plan_sections_zero_target_sections_even_when_budget_exhausted() {
        let (_, sections) =
            plan_sections("expand to 1000 words with sections: intro (900 words), body, conclusion");
        let body = sections.iter().find(|s| s.title.to_lowercase() == "body").unwrap();
        assert_eq!(body.target_words, 50);
    }

    #[test]
    fn test_plan_sections_dissertation_without_structure_gets_eight_sections() {
        let (_, sections) = plan_sections("TURN THIS INTO A 20000 WORD DISSERTATION");
        assert_eq!(sections.len(), 8);
        let total: usize = sections.iter().map(|s| s.target_words).sum();
        assert_eq!(total, 20_000);
    }

    #[test]
    fn test_prepare_expansion_job_builds_one_chunk_per_section() {
        let (job, chunks) =
            prepare_expansion_job("plan-1".into(), "expand to 3000 words with sections: a, b, c".into()).unwrap();
        assert_eq!(job.total_chunks, 3);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().enumerate().all(|(i, c)| c.chunk_index == i));
    }

    #[test]
    fn test_prepare_expansion_job_chunk_bands_follow_section_targets() {
        let (_, chunks) =
            prepare_expansion_job("plan-2".into(), "expand to 9000 words with sections: a, b, c".into()).unwrap();
        for chunk in &chunks {
            assert!(chunk.min_words <= chunk.target_words);
            assert!(chunk.max_words >= chunk.target_words);
        }
    }
}
