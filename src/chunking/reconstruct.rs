//! Paragraph/sentence-boundary chunking strategy.
//!
//! Splits source text into ordered segments that favor paragraph breaks,
//! falling back to sentence breaks for any paragraph that alone exceeds
//! the chunk size ceiling. Chunk boundaries are deterministic for a given
//! `(text, chunk_target)` pair, which is required since they become part
//! of a job's persisted state.

use crate::chunking::traits::{ChunkSpec, Chunker};
use crate::error::{ChunkingError, Result};
use crate::io::unicode::split_sentences;
use crate::length::{count_words, CHUNK_TARGET_FLOOR};

/// Chunk size ceiling, expressed as a multiple of the chunk target.
const CEILING_MULTIPLE: usize = 2;

/// Chunker that splits on paragraph boundaries, falling back to sentence
/// boundaries when a single paragraph would overflow the ceiling.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconstructionChunker;

impl ReconstructionChunker {
    /// Creates a new chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Chunker for ReconstructionChunker {
    fn chunk(&self, text: &str, chunk_target: usize) -> Result<Vec<ChunkSpec>> {
        if chunk_target == 0 {
            return Err(ChunkingError::InvalidConfig {
                reason: "chunk_target must be > 0".to_string(),
            }
            .into());
        }

        let ceiling = chunk_target * CEILING_MULTIPLE;
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        if paragraphs.is_empty() {
            return Ok(vec![]);
        }

        let mut units: Vec<&str> = Vec::new();
        for para in paragraphs {
            if count_words(para) > ceiling {
                units.extend(split_sentences(para));
            } else {
                units.push(para);
            }
        }

        let mut chunks: Vec<ChunkSpec> = Vec::new();
        let mut current = String::new();
        let mut current_words = 0usize;

        for unit in units {
            let unit_words = count_words(unit);
            if !current.is_empty() && current_words + unit_words > ceiling {
                chunks.push(finish_chunk(&mut current, &mut current_words));
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(unit);
            current_words += unit_words;

            if current_words >= chunk_target {
                chunks.push(finish_chunk(&mut current, &mut current_words));
            }
        }
        if !current.is_empty() {
            chunks.push(finish_chunk(&mut current, &mut current_words));
        }

        merge_undersized_tail(&mut chunks);

        Ok(chunks)
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }
}

fn finish_chunk(current: &mut String, current_words: &mut usize) -> ChunkSpec {
    let spec = ChunkSpec {
        text: current.clone(),
        word_count: *current_words,
    };
    current.clear();
    *current_words = 0;
    spec
}

/// Merges a final chunk below the floor into its predecessor, so the last
/// segment of a document never falls below [`CHUNK_TARGET_FLOOR`] words
/// purely as an artifact of chunk boundaries.
fn merge_undersized_tail(chunks: &mut Vec<ChunkSpec>) {
    if chunks.len() < 2 {
        return;
    }
    let Some(last) = chunks.last() else { return };
    if last.word_count >= CHUNK_TARGET_FLOOR {
        return;
    }
    let Some(tail) = chunks.pop() else { return };
    if let Some(prev) = chunks.last_mut() {
        prev.text.push_str("\n\n");
        prev.text.push_str(&tail.text);
        prev.word_count += tail.word_count;
    } else {
        chunks.push(tail);
    }
}
