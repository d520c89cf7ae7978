//! Chunk record representation.
//!
//! A [`ChunkRecord`] tracks one source-text segment through reconstruction:
//! its length band, its current status, and — once processed — the
//! reconstructed output and the delta it contributed to the coherence
//! context.

use serde::{Deserialize, Serialize};

use super::current_timestamp;
use super::delta::ChunkDelta;

/// Processing status of a chunk within its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Not yet picked up by the job controller.
    Pending,
    /// Currently being reconstructed (including length-enforcement retries).
    Processing,
    /// Reconstructed successfully within its length band.
    Complete,
    /// Reconstructed but outside its length band after exhausting
    /// continuation attempts; the job continues but the chunk is marked.
    Flagged,
    /// Reconstruction failed after exhausting the chunk retry budget.
    Failed,
}

/// One source-text segment and its reconstruction state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Unique identifier (assigned by storage).
    pub id: Option<i64>,
    /// ID of the owning job.
    pub job_id: String,
    /// Zero-based position of this chunk within the job.
    pub chunk_index: usize,
    /// Source text for this chunk.
    pub source_text: String,
    /// Target word count for the reconstructed output.
    pub target_words: usize,
    /// Minimum acceptable word count (0.85 * target).
    pub min_words: usize,
    /// Maximum acceptable word count (1.15 * target).
    pub max_words: usize,
    /// Current processing status.
    pub status: ChunkStatus,
    /// Reconstructed output text, once produced.
    pub output_text: Option<String>,
    /// Actual word count of `output_text`.
    pub actual_words: Option<usize>,
    /// Number of length-enforcement continuation attempts consumed.
    pub retry_count: u32,
    /// Structured delta extracted from the reconstruction, if any.
    pub chunk_delta: Option<ChunkDelta>,
    /// Whether the stitcher flagged conflicts traceable to this chunk.
    pub conflicts_detected: bool,
    /// Unix timestamp when the chunk record was created.
    pub created_at: i64,
    /// Unix timestamp of the last update.
    pub updated_at: i64,
}

impl ChunkRecord {
    /// Creates a new pending chunk record for the given length band.
    #[must_use]
    pub fn new(
        job_id: String,
        chunk_index: usize,
        source_text: String,
        target_words: usize,
        min_words: usize,
        max_words: usize,
    ) -> Self {
        let now = current_timestamp();
        Self {
            id: None,
            job_id,
            chunk_index,
            source_text,
            target_words,
            min_words,
            max_words,
            status: ChunkStatus::Pending,
            output_text: None,
            actual_words: None,
            retry_count: 0,
            chunk_delta: None,
            conflicts_detected: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns whether `word_count` falls inside this chunk's accepted band.
    #[must_use]
    pub const fn within_band(&self, word_count: usize) -> bool {
        word_count >= self.min_words && word_count <= self.max_words
    }

    /// Records a finished reconstruction with a status chosen by the
    /// length enforcer (`Complete` on success or partial success, `Flagged`
    /// on hard failure after the continuation cap).
    pub fn complete_with(
        &mut self,
        output: String,
        word_count: usize,
        delta: ChunkDelta,
        status: ChunkStatus,
    ) {
        self.status = status;
        self.actual_words = Some(word_count);
        self.output_text = Some(output);
        self.chunk_delta = Some(delta);
        self.updated_at = current_timestamp();
    }

    /// Marks the chunk as having exhausted its retry budget.
    pub fn fail(&mut self) {
        self.status = ChunkStatus::Failed;
        self.updated_at = current_timestamp();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> ChunkRecord {
        ChunkRecord::new("job-1".into(), 0, "source".into(), 1_000, 850, 1_150)
    }

    #[test]
    fn test_new_chunk_is_pending() {
        let c = chunk();
        assert_eq!(c.status, ChunkStatus::Pending);
        assert!(c.output_text.is_none());
    }

    #[test]
    fn test_within_band() {
        let c = chunk();
        assert!(c.within_band(1_000));
        assert!(c.within_band(850));
        assert!(c.within_band(1_150));
        assert!(!c.within_band(849));
        assert!(!c.within_band(1_151));
    }

    #[test]
    fn test_complete_with_in_band_marks_complete() {
        let mut c = chunk();
        c.complete_with("text".into(), 1_000, ChunkDelta::default(), ChunkStatus::Complete);
        assert_eq!(c.status, ChunkStatus::Complete);
        assert_eq!(c.actual_words, Some(1_000));
    }

    #[test]
    fn test_complete_with_out_of_band_marks_flagged() {
        let mut c = chunk();
        c.complete_with("text".into(), 400, ChunkDelta::default(), ChunkStatus::Flagged);
        assert_eq!(c.status, ChunkStatus::Flagged);
    }

    #[test]
    fn test_fail_marks_failed() {
        let mut c = chunk();
        c.fail();
        assert_eq!(c.status, ChunkStatus::Failed);
    }
}
