//! Job Controller: the per-job state machine driver.
//!
//! Drives a job through `pending -> skeleton_extraction -> chunk_processing
//! -> stitching -> {complete|failed|aborted}`, broadcasting progress events
//! and appending audit events at each step. Chunk processing within a job
//! is strictly sequential; multiple jobs may run concurrently, coordinated
//! through [`JobRegistry`] so at most one runner drives a given job at a
//! time.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::chunking::{ChunkSpec, Chunker, ReconstructionChunker};
use crate::core::{
    AuditEventKind, ChunkRecord, ChunkStatus, GlobalSkeleton, Job, JobStatus, StitchResult,
};
use crate::directive;
use crate::error::{PipelineError, Result};
use crate::length::{calculate_length_config, count_words, length_band, LengthConfig, MAX_INPUT_WORDS, MIN_INPUT_WORDS};
use crate::llm::LlmProvider;
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::{length_enforcer, reconstructor, skeleton_extractor, stitcher};
use crate::storage::Storage;

/// Number of whole-chunk transport retries before a chunk (and the job) is
/// marked failed.
const CHUNK_TRANSPORT_RETRIES: u32 = 3;
/// Backoff schedule applied between chunk transport retries.
const CHUNK_RETRY_BACKOFF: [Duration; 3] = [Duration::from_secs(2), Duration::from_secs(5), Duration::from_secs(15)];
/// First chunk index (0-based) at which the shortfall projection runs.
const SHORTFALL_CHECK_START: usize = 19;
/// Interval, in chunks, between shortfall projections after the first check.
const SHORTFALL_CHECK_INTERVAL: usize = 10;
/// Shortfall fraction above which a `warning` event is broadcast.
const SHORTFALL_WARNING_THRESHOLD: f64 = 0.25;

/// Status reported in a `chunk_complete` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkCompleteStatus {
    /// Landed within band on the first pass.
    OnTarget,
    /// Still within the continuation loop (not used in the terminal event
    /// today, reserved for future incremental progress reporting).
    Retrying,
    /// Landed within band only after one or more continuations.
    PassedAfterRetry,
    /// Exhausted continuations without reaching the minimum band.
    Flagged,
}

/// Live progress/result events broadcast to stream observers.
///
/// Serializes as `{"type": "<variant>", ...fields}` to match the envelope
/// shape observers expect on `/ws/cc-stream`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PipelineEvent {
    /// A job has begun skeleton extraction.
    JobStarted {
        /// Job identifier.
        job_id: String,
        /// Planned total chunk count.
        total_chunks: usize,
        /// Source document word count.
        input_words: usize,
        /// Target word count for the reconstructed document.
        target_words: usize,
        /// Reconstruction mode (compress/preserve/expand/custom).
        length_mode: String,
        /// `target / source` ratio.
        length_ratio: f64,
    },
    /// A phase transition or periodic status update.
    Progress {
        /// Job identifier.
        job_id: String,
        /// Current phase name.
        phase: String,
        /// Human-readable status message.
        message: String,
        /// Chunks completed so far, if applicable.
        completed_chunks: Option<usize>,
        /// Total planned chunks, if applicable.
        total_chunks: Option<usize>,
    },
    /// One chunk finished reconstruction (and, if needed, length
    /// enforcement).
    ChunkComplete {
        /// Job identifier.
        job_id: String,
        /// Zero-based chunk index.
        chunk_index: usize,
        /// Total planned chunks.
        total_chunks: usize,
        /// Reconstructed chunk text.
        chunk_text: String,
        /// Actual word count produced.
        actual_words: usize,
        /// Target word count for this chunk.
        target_words: usize,
        /// Minimum accepted word count.
        min_words: usize,
        /// Maximum accepted word count.
        max_words: usize,
        /// Cumulative word count across all completed chunks so far.
        running_total: usize,
        /// Projected final word count at the current pace.
        projected_final: usize,
        /// Outcome classification for this chunk.
        status: ChunkCompleteStatus,
    },
    /// The job is projected to fall short of its target by more than
    /// [`SHORTFALL_WARNING_THRESHOLD`].
    Warning {
        /// Job identifier.
        job_id: String,
        /// Human-readable warning message.
        message: String,
        /// Projected final word count at the current pace.
        projected_final: usize,
        /// Target word count.
        target_words: usize,
        /// Shortfall as a percentage (0-100).
        shortfall: f64,
    },
    /// The job finished successfully.
    JobComplete {
        /// Job identifier.
        job_id: String,
        /// Final stitched output.
        final_output: String,
        /// Final word count.
        final_word_count: usize,
        /// Target word count.
        target_words: usize,
        /// Stitcher's coherence verdict, as a string.
        stitch_result: String,
        /// Wall-clock time the job took, in seconds.
        time_elapsed: f64,
    },
    /// The job failed and will not be retried further.
    JobFailed {
        /// Job identifier.
        job_id: String,
        /// Failure reason.
        error: String,
    },
    /// The job was aborted by client request.
    JobAborted {
        /// Job identifier.
        job_id: String,
        /// Chunks completed before the abort took effect.
        completed_chunks: usize,
        /// Total planned chunks.
        total_chunks: usize,
        /// Concatenation of all completed chunk outputs.
        partial_output: String,
        /// Word count of `partial_output`.
        word_count: usize,
    },
    /// A protocol- or transport-level error unrelated to a specific job.
    Error {
        /// Error message.
        message: String,
    },
}

/// Outcome of a completed (or aborted/failed) job run.
pub struct RunOutcome {
    /// Final job state.
    pub job: Job,
    /// Stitch result, if the job reached the stitching phase.
    pub stitch: Option<StitchResult>,
}

/// Process-wide registry of actively running jobs.
///
/// Prevents two runners from driving the same job concurrently, and gives
/// external callers (the WebSocket handler, the CLI `abort` command) a
/// cooperative abort flag checked at each chunk boundary.
#[derive(Default, Clone)]
pub struct JobRegistry {
    inner: Arc<RwLock<HashMap<String, Arc<AtomicBool>>>>,
}

impl JobRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job_id` as actively running, returning its abort flag.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::AlreadyRunning`] if the job already has an
    /// active runner.
    pub async fn register(&self, job_id: &str) -> Result<Arc<AtomicBool>> {
        let mut guard = self.inner.write().await;
        if guard.contains_key(job_id) {
            return Err(PipelineError::AlreadyRunning {
                job_id: job_id.to_string(),
            }
            .into());
        }
        let flag = Arc::new(AtomicBool::new(false));
        guard.insert(job_id.to_string(), flag.clone());
        Ok(flag)
    }

    /// Removes `job_id` from the active-runner set.
    pub async fn unregister(&self, job_id: &str) {
        self.inner.write().await.remove(job_id);
    }

    /// Requests that the runner for `job_id` abort at the next chunk
    /// boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the job has no active runner.
    pub async fn request_abort(&self, job_id: &str) -> Result<()> {
        let guard = self.inner.read().await;
        match guard.get(job_id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
            None => Err(crate::error::StorageError::JobNotFound {
                id: job_id.to_string(),
            }
            .into()),
        }
    }

    /// Returns whether `job_id` currently has an active runner.
    pub async fn is_running(&self, job_id: &str) -> bool {
        self.inner.read().await.contains_key(job_id)
    }
}

/// Builds a new job and its planned chunk rows from a source document and
/// free-text instruction, without persisting or running it.
///
/// # Errors
///
/// Returns [`PipelineError::InputOutOfBounds`] if the source document's
/// word count falls outside `[501, 50_000]`.
pub fn prepare_job(id: String, source_text: String, instruction: String) -> Result<(Job, Vec<ChunkRecord>)> {
    let source_words = count_words(&source_text);
    if !(MIN_INPUT_WORDS..=MAX_INPUT_WORDS).contains(&source_words) {
        return Err(PipelineError::InputOutOfBounds {
            actual: source_words,
            min: MIN_INPUT_WORDS,
            max: MAX_INPUT_WORDS,
        }
        .into());
    }

    let directive = directive::parse(&instruction);
    let sizing = calculate_length_config(&instruction, source_words, 1);
    let chunker = ReconstructionChunker::new();
    let specs = chunker.chunk(&source_text, sizing.chunk_target)?;
    let num_chunks = specs.len().max(1);
    let length_config = calculate_length_config(&instruction, source_words, num_chunks);

    let mut job = Job::new(id, source_text, instruction, directive, length_config.clone());
    job.total_chunks = specs.len();

    let chunks = build_chunk_records(&job.id, &specs, &length_config);
    Ok((job, chunks))
}

fn build_chunk_records(job_id: &str, specs: &[ChunkSpec], length_config: &LengthConfig) -> Vec<ChunkRecord> {
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let (min, max) = length_band(length_config.chunk_target);
            ChunkRecord::new(job_id.to_string(), index, spec.text.clone(), length_config.chunk_target, min, max)
        })
        .collect()
}

/// Runs a job to completion (or failure/abort), driving it through every
/// remaining state from its current status.
///
/// # Errors
///
/// Returns an error if the job does not exist or storage operations fail.
/// Chunk-level and stitch-level failures are captured in the returned
/// [`RunOutcome`] rather than propagated, except when the chunk retry
/// budget is exhausted, which fails the job and returns an error.
pub async fn run_job(
    storage: &mut dyn Storage,
    provider: &Arc<dyn LlmProvider>,
    registry: &JobRegistry,
    events: &broadcast::Sender<PipelineEvent>,
    job_id: &str,
    config: &PipelineConfig,
) -> Result<RunOutcome> {
    let abort_flag = registry.register(job_id).await?;
    let result = run_job_inner(storage, provider, &abort_flag, events, job_id, config).await;
    registry.unregister(job_id).await;
    result
}

#[allow(clippy::too_many_lines)]
async fn run_job_inner(
    storage: &mut dyn Storage,
    provider: &Arc<dyn LlmProvider>,
    abort_flag: &Arc<AtomicBool>,
    events: &broadcast::Sender<PipelineEvent>,
    job_id: &str,
    config: &PipelineConfig,
) -> Result<RunOutcome> {
    let start = Instant::now();
    let mut job = storage
        .get_job(job_id)?
        .ok_or_else(|| crate::error::StorageError::JobNotFound { id: job_id.to_string() })?;

    if job.status.is_terminal() {
        let stitch = storage.get_stitch_result(job_id)?;
        return Ok(RunOutcome { job, stitch });
    }

    if job.status == JobStatus::Pending {
        job.transition_to(JobStatus::SkeletonExtraction)?;
        storage.update_job(&job)?;
        let _ = events.send(PipelineEvent::JobStarted {
            job_id: job.id.clone(),
            total_chunks: job.total_chunks,
            input_words: count_words(&job.source_text),
            target_words: job.length_config.target,
            length_mode: format!("{:?}", job.length_config.mode).to_lowercase(),
            length_ratio: job.length_config.ratio,
        });
        storage.append_audit_event(job_id, AuditEventKind::JobCreated, serde_json::json!({}))?;
    }

    let skeleton = match storage.load_skeleton(job_id)? {
        Some(s) => s,
        None => {
            let skeleton = skeleton_extractor::extract_skeleton(
                provider,
                &job.source_text,
                &job.directive_plan,
                &job.length_config,
                config,
            )
            .await?;
            storage.save_skeleton(job_id, &skeleton)?;
            storage.append_audit_event(
                job_id,
                AuditEventKind::StatusChanged,
                serde_json::json!({"phase": "skeleton_extracted"}),
            )?;
            skeleton
        }
    };

    if job.status == JobStatus::SkeletonExtraction {
        job.transition_to(JobStatus::ChunkProcessing)?;
        storage.update_job(&job)?;
    }

    if job.status == JobStatus::ChunkProcessing {
        if let Some(outcome) = run_chunk_loop(storage, provider, abort_flag, events, &mut job, &skeleton, config).await? {
            return Ok(outcome);
        }
        job.transition_to(JobStatus::Stitching)?;
        storage.update_job(&job)?;
    }

    let chunks = storage.get_chunks(job_id)?;
    let stitch_result = stitcher::run_stitch(provider, job_id, &skeleton, &chunks, config).await;
    storage.save_stitch_result(&stitch_result)?;
    storage.append_audit_event(
        job_id,
        AuditEventKind::StitchCompleted,
        serde_json::json!({"verdict": format!("{:?}", stitch_result.verdict)}),
    )?;

    job.final_output = Some(stitch_result.final_output.clone());
    job.transition_to(JobStatus::Complete)?;
    storage.update_job(&job)?;

    let _ = events.send(PipelineEvent::JobComplete {
        job_id: job.id.clone(),
        final_output: stitch_result.final_output.clone(),
        final_word_count: count_words(&stitch_result.final_output),
        target_words: job.length_config.target,
        stitch_result: format!("{:?}", stitch_result.verdict),
        time_elapsed: start.elapsed().as_secs_f64(),
    });

    Ok(RunOutcome {
        job,
        stitch: Some(stitch_result),
    })
}

/// Drives the sequential chunk loop. Returns `Some(outcome)` if the job
/// terminated early (abort or chunk failure), `None` if every chunk
/// completed and the caller should proceed to stitching.
#[allow(clippy::too_many_arguments)]
async fn run_chunk_loop(
    storage: &mut dyn Storage,
    provider: &Arc<dyn LlmProvider>,
    abort_flag: &Arc<AtomicBool>,
    events: &broadcast::Sender<PipelineEvent>,
    job: &mut Job,
    skeleton: &GlobalSkeleton,
    config: &PipelineConfig,
) -> Result<Option<RunOutcome>> {
    let mut running_words: usize = storage
        .get_chunks(&job.id)?
        .iter()
        .filter_map(|c| c.actual_words)
        .sum();

    for chunk_index in job.current_chunk..job.total_chunks {
        if abort_flag.load(Ordering::SeqCst) {
            return Ok(Some(finish_aborted(storage, job, chunk_index, events).await?));
        }

        let Some(chunk) = storage.get_chunk(&job.id, chunk_index)? else {
            break;
        };

        match run_one_chunk(storage, provider, events, job, skeleton, &chunk, config, &mut running_words).await {
            Ok(()) => {}
            Err(e) => {
                warn!(job_id = %job.id, chunk_index, error = %e, "chunk exhausted retries, failing job");
                job.error_message = Some(e.to_string());
                job.transition_to(JobStatus::Failed)?;
                storage.update_job(job)?;
                storage.append_audit_event(&job.id, AuditEventKind::Failed, serde_json::json!({"error": e.to_string()}))?;
                let _ = events.send(PipelineEvent::JobFailed {
                    job_id: job.id.clone(),
                    error: e.to_string(),
                });
                return Ok(Some(RunOutcome {
                    job: job.clone(),
                    stitch: None,
                }));
            }
        }

        maybe_warn_shortfall(job, chunk_index, running_words, events);
    }

    Ok(None)
}

#[allow(clippy::too_many_arguments)]
async fn run_one_chunk(
    storage: &mut dyn Storage,
    provider: &Arc<dyn LlmProvider>,
    events: &broadcast::Sender<PipelineEvent>,
    job: &mut Job,
    skeleton: &GlobalSkeleton,
    chunk: &ChunkRecord,
    config: &PipelineConfig,
    running_words: &mut usize,
) -> Result<()> {
    let prior_deltas = storage.load_prior_deltas(&job.id, chunk.chunk_index)?;
    let mut ctx = crate::core::delta::CoherenceContext::default();
    for delta in &prior_deltas {
        ctx.accumulate(delta);
    }
    let context_summary = ctx.format_summary(prior_deltas.len());

    let mut last_err = None;
    let mut outcome = None;
    for attempt in 0..CHUNK_TRANSPORT_RETRIES {
        match reconstructor::reconstruct_chunk(
            provider,
            &chunk.source_text,
            chunk.chunk_index,
            job.total_chunks,
            skeleton,
            chunk.target_words,
            &context_summary,
            config,
        )
        .await
        {
            Ok(o) => {
                outcome = Some(o);
                break;
            }
            Err(e) => {
                warn!(job_id = %job.id, chunk_index = chunk.chunk_index, attempt, error = %e, "chunk reconstruction failed");
                last_err = Some(e);
                storage.append_audit_event(
                    &job.id,
                    AuditEventKind::ChunkRetried,
                    serde_json::json!({"chunk_index": chunk.chunk_index, "attempt": attempt}),
                )?;
                if (attempt as usize) < CHUNK_RETRY_BACKOFF.len() {
                    tokio::time::sleep(CHUNK_RETRY_BACKOFF[attempt as usize]).await;
                }
            }
        }
    }

    let Some(outcome) = outcome else {
        return Err(last_err.unwrap_or_else(|| {
            PipelineError::RetriesExhausted {
                chunk_index: chunk.chunk_index,
                reason: "transport".to_string(),
            }
            .into()
        }));
    };

    let first_pass_words = count_words(&outcome.output_text);
    let needs_enforcement = first_pass_words < chunk.min_words || outcome.stop_reason == crate::llm::StopReason::MaxTokens;

    let (final_text, final_words, attempts, status) = if needs_enforcement {
        let enforced = length_enforcer::enforce_length(
            provider,
            &config.model,
            outcome.output_text,
            outcome.stop_reason,
            chunk.min_words,
            chunk.target_words,
            config,
        )
        .await?;
        (enforced.output_text, enforced.word_count, enforced.attempts, enforced.status)
    } else {
        (outcome.output_text, first_pass_words, 0, ChunkStatus::Complete)
    };

    storage.write_chunk_result(&job.id, chunk.chunk_index, &final_text, final_words, &outcome.delta, status)?;
    storage.append_audit_event(
        &job.id,
        AuditEventKind::ChunkCompleted,
        serde_json::json!({"chunk_index": chunk.chunk_index, "words": final_words}),
    )?;

    *running_words += final_words;
    job.current_chunk = chunk.chunk_index + 1;
    let projected_final = projected_final_words(*running_words, job.current_chunk, job.total_chunks);

    let complete_status = match (attempts, status) {
        (_, ChunkStatus::Flagged) => ChunkCompleteStatus::Flagged,
        (0, _) => ChunkCompleteStatus::OnTarget,
        (_, _) => ChunkCompleteStatus::PassedAfterRetry,
    };

    let _ = events.send(PipelineEvent::ChunkComplete {
        job_id: job.id.clone(),
        chunk_index: chunk.chunk_index,
        total_chunks: job.total_chunks,
        chunk_text: final_text,
        actual_words: final_words,
        target_words: chunk.target_words,
        min_words: chunk.min_words,
        max_words: chunk.max_words,
        running_total: *running_words,
        projected_final,
        status: complete_status,
    });

    tokio::time::sleep(length_enforcer::inter_chunk_pause(config, chunk.chunk_index)).await;
    Ok(())
}

fn projected_final_words(running_words: usize, chunks_done: usize, total_chunks: usize) -> usize {
    if chunks_done == 0 || total_chunks == 0 {
        return running_words;
    }
    ((running_words as f64 / chunks_done as f64) * total_chunks as f64).round() as usize
}

fn maybe_warn_shortfall(job: &Job, chunk_index: usize, running_words: usize, events: &broadcast::Sender<PipelineEvent>) {
    if chunk_index < SHORTFALL_CHECK_START {
        return;
    }
    if (chunk_index - SHORTFALL_CHECK_START) % SHORTFALL_CHECK_INTERVAL != 0 {
        return;
    }
    let Some(shortfall_fraction) = job.projected_shortfall(running_words) else {
        return;
    };
    if shortfall_fraction <= SHORTFALL_WARNING_THRESHOLD {
        return;
    }
    let projected_final = projected_final_words(running_words, chunk_index + 1, job.total_chunks);
    let _ = events.send(PipelineEvent::Warning {
        job_id: job.id.clone(),
        message: format!(
            "projected final word count {projected_final} falls short of target {} by {:.0}%",
            job.length_config.target,
            shortfall_fraction * 100.0
        ),
        projected_final,
        target_words: job.length_config.target,
        shortfall: shortfall_fraction * 100.0,
    });
}

async fn finish_aborted(
    storage: &mut dyn Storage,
    job: &mut Job,
    completed_before: usize,
    events: &broadcast::Sender<PipelineEvent>,
) -> Result<RunOutcome> {
    let chunks = storage.get_chunks(&job.id)?;
    let partial_output = stitcher::concatenate(&chunks);
    let word_count = count_words(&partial_output);

    job.transition_to(JobStatus::Aborted)?;
    job.final_output = Some(partial_output.clone());
    storage.update_job(job)?;
    storage.append_audit_event(&job.id, AuditEventKind::Aborted, serde_json::json!({"completed_chunks": completed_before}))?;

    info!(job_id = %job.id, completed_before, "job aborted at chunk boundary");
    let _ = events.send(PipelineEvent::JobAborted {
        job_id: job.id.clone(),
        completed_chunks: completed_before,
        total_chunks: job.total_chunks,
        partial_output,
        word_count,
    });

    Ok(RunOutcome {
        job: job.clone(),
        stitch: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StubLlmProvider;
    use crate::storage::SqliteStorage;

    fn source_text(words: usize) -> String {
        "word ".repeat(words)
    }

    #[test]
    fn test_prepare_job_rejects_too_short_source() {
        let result = prepare_job("j1".into(), source_text(10), "expand".into());
        assert!(result.is_err());
    }

    #[test]
    fn test_prepare_job_builds_chunks() {
        let (job, chunks) = prepare_job("j1".into(), source_text(3_000), "expand to 3000 words".into()).unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(job.total_chunks, chunks.len());
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate_registration() {
        let registry = JobRegistry::new();
        let _flag = registry.register("j1").await.unwrap();
        assert!(registry.register("j1").await.is_err());
        registry.unregister("j1").await;
        assert!(registry.register("j1").await.is_ok());
    }

    #[tokio::test]
    async fn test_run_job_happy_path_completes() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        let (job, chunks) = prepare_job("j1".into(), source_text(1_200), "expand to 1500 words".into()).unwrap();
        storage.create_job(&job).unwrap();
        storage.create_chunks(&chunks).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::with_fill_fraction(1.0));
        let registry = JobRegistry::new();
        let (tx, _rx) = broadcast::channel(64);
        let mut config = PipelineConfig::default();
        config.continuation_pause = Duration::from_millis(1);
        config.chunk_pause_min = Duration::from_millis(1);
        config.chunk_pause_max = Duration::from_millis(2);

        let outcome = run_job(&mut storage, &provider, &registry, &tx, "j1", &config).await.unwrap();
        assert_eq!(outcome.job.status, JobStatus::Complete);
        assert!(outcome.stitch.is_some());
    }

    #[tokio::test]
    async fn test_run_job_aborts_at_chunk_boundary() {
        let mut storage = SqliteStorage::in_memory().unwrap();
        storage.init().unwrap();
        let (job, chunks) = prepare_job("j1".into(), source_text(3_000), "expand to 4000 words".into()).unwrap();
        storage.create_job(&job).unwrap();
        storage.create_chunks(&chunks).unwrap();

        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::with_fill_fraction(1.0));
        let (tx, _rx) = broadcast::channel(64);
        let mut config = PipelineConfig::default();
        config.continuation_pause = Duration::from_millis(1);
        config.chunk_pause_min = Duration::from_millis(1);
        config.chunk_pause_max = Duration::from_millis(2);

        // Pre-set abort so the very first chunk boundary check trips it,
        // bypassing the registration race a real abort request would race.
        let abort_flag = Arc::new(AtomicBool::new(true));
        let outcome = run_job_inner(&mut storage, &provider, &abort_flag, &tx, "j1", &config).await.unwrap();
        assert_eq!(outcome.job.status, JobStatus::Aborted);
        assert!(outcome.stitch.is_none());
    }
}
