//! Job representation for the reconstruction pipeline.
//!
//! A job is one end-to-end reconstruction run: source text plus a free-text
//! instruction, progressing through skeleton extraction, sequential chunk
//! reconstruction, and a final stitching pass.

use serde::{Deserialize, Serialize};

use super::current_timestamp;
use crate::directive::DirectivePlan;
use crate::length::LengthConfig;

/// Lifecycle state of a job.
///
/// Transitions are forward-only: `Pending -> SkeletonExtraction ->
/// ChunkProcessing -> Stitching -> Complete`, with `Failed` and `Aborted`
/// reachable from any in-flight state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job has been created but processing has not started.
    Pending,
    /// The global skeleton is being extracted.
    SkeletonExtraction,
    /// Chunks are being reconstructed sequentially.
    ChunkProcessing,
    /// The final stitching pass is running.
    Stitching,
    /// The job finished successfully.
    Complete,
    /// The job failed and will not be retried further.
    Failed,
    /// The job was aborted by client request.
    Aborted,
}

impl JobStatus {
    /// Returns whether this status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed | Self::Aborted)
    }

    /// Returns whether transitioning from `self` to `next` is a legal
    /// forward-only state transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Self::Pending, Self::SkeletonExtraction)
                | (Self::SkeletonExtraction, Self::ChunkProcessing)
                | (Self::ChunkProcessing, Self::Stitching)
                | (Self::Stitching, Self::Complete)
                | (_, Self::Failed)
                | (_, Self::Aborted)
        )
    }
}

/// A single reconstruction job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (UUID string, assigned at creation).
    pub id: String,
    /// Original source text submitted for reconstruction.
    pub source_text: String,
    /// Free-text instruction describing the desired transformation.
    pub instruction: String,
    /// Structured plan parsed from `instruction`.
    pub directive_plan: DirectivePlan,
    /// Resolved target/min/max word counts and chunk sizing.
    pub length_config: LengthConfig,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Index of the chunk currently being processed (cursor for resume).
    pub current_chunk: usize,
    /// Total number of chunks planned for this job.
    pub total_chunks: usize,
    /// Number of whole-job retries consumed so far.
    pub retry_count: u32,
    /// Final stitched output, set once the job completes.
    pub final_output: Option<String>,
    /// Human-readable failure reason, set if `status == Failed`.
    pub error_message: Option<String>,
    /// Unix timestamp when the job was created.
    pub created_at: i64,
    /// Unix timestamp of the last state update.
    pub updated_at: i64,
}

impl Job {
    /// Creates a new job in the `Pending` state.
    #[must_use]
    pub fn new(
        id: String,
        source_text: String,
        instruction: String,
        directive_plan: DirectivePlan,
        length_config: LengthConfig,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id,
            source_text,
            instruction,
            directive_plan,
            length_config,
            status: JobStatus::Pending,
            current_chunk: 0,
            total_chunks: 0,
            retry_count: 0,
            final_output: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attempts to transition to `next`, touching `updated_at` on success.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PipelineError::InvalidTransition`] if the
    /// transition is not forward-only legal from the current state.
    pub fn transition_to(&mut self, next: JobStatus) -> crate::error::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(crate::error::PipelineError::InvalidTransition {
                job_id: self.id.clone(),
                state: format!("{:?}", self.status),
            }
            .into());
        }
        self.status = next;
        self.updated_at = current_timestamp();
        Ok(())
    }

    /// Projects whether the job is on track to fall short of its target
    /// word count, given the average words produced per chunk so far.
    ///
    /// Used by the job controller's periodic shortfall warning (emitted
    /// every tenth chunk starting at index 19).
    #[must_use]
    pub fn projected_shortfall(&self, words_so_far: usize) -> Option<f64> {
        if self.current_chunk == 0 || self.total_chunks == 0 {
            return None;
        }
        let avg = words_so_far as f64 / self.current_chunk as f64;
        let projected_total = avg * self.total_chunks as f64;
        let target = self.length_config.target as f64;
        if projected_total < target {
            Some((target - projected_total) / target)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DirectivePlan {
        DirectivePlan::default()
    }

    fn cfg() -> LengthConfig {
        LengthConfig::new(5_000)
    }

    #[test]
    fn test_job_starts_pending() {
        let job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_chunk, 0);
    }

    #[test]
    fn test_legal_transition_sequence() {
        let mut job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        job.transition_to(JobStatus::SkeletonExtraction).unwrap();
        job.transition_to(JobStatus::ChunkProcessing).unwrap();
        job.transition_to(JobStatus::Stitching).unwrap();
        job.transition_to(JobStatus::Complete).unwrap();
        assert_eq!(job.status, JobStatus::Complete);
    }

    #[test]
    fn test_illegal_skip_transition_rejected() {
        let mut job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        let result = job.transition_to(JobStatus::Stitching);
        assert!(result.is_err());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn test_terminal_state_is_final() {
        let mut job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        job.transition_to(JobStatus::Failed).unwrap();
        assert!(job.transition_to(JobStatus::ChunkProcessing).is_err());
    }

    #[test]
    fn test_abort_from_any_in_flight_state() {
        let mut job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        job.transition_to(JobStatus::SkeletonExtraction).unwrap();
        job.transition_to(JobStatus::Aborted).unwrap();
        assert_eq!(job.status, JobStatus::Aborted);
    }

    #[test]
    fn test_projected_shortfall_none_before_first_chunk() {
        let job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        assert!(job.projected_shortfall(0).is_none());
    }

    #[test]
    fn test_projected_shortfall_detects_pace() {
        let mut job = Job::new("j1".into(), "src".into(), "expand".into(), plan(), cfg());
        job.total_chunks = 10;
        job.current_chunk = 5;
        // Averaging 400 words/chunk over 10 chunks projects 4000 < target 5000.
        let shortfall = job.projected_shortfall(2_000);
        assert!(shortfall.is_some());
    }
}
