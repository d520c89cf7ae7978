//! Chunker trait definition.
//!
//! Defines the interface for segmenting source text into chunks ahead of
//! reconstruction, enabling pluggable segmentation strategies.

use crate::error::Result;

/// One source-text segment produced by a [`Chunker`], before it has been
/// assigned to a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpec {
    /// Segment text.
    pub text: String,
    /// Word count of `text`.
    pub word_count: usize,
}

/// Trait for splitting source text into ordered, processable segments.
///
/// Implementations must be `Send + Sync` and must produce identical
/// output for identical input — chunk boundaries are part of a job's
/// persisted state and must be reproducible on resume.
pub trait Chunker: Send + Sync {
    /// Splits `text` into ordered chunks targeting `chunk_target` words
    /// per chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if `chunk_target` is zero.
    fn chunk(&self, text: &str, chunk_target: usize) -> Result<Vec<ChunkSpec>>;

    /// Returns the name of the chunking strategy.
    fn name(&self) -> &'static str;
}
