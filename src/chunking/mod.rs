//! Chunking strategy for the reconstruction pipeline.
//!
//! Splits source text into ordered segments targeting a configured chunk
//! word count, respecting paragraph and sentence boundaries so a chunk
//! never starts or ends mid-sentence.

pub mod reconstruct;
pub mod traits;

pub use reconstruct::ReconstructionChunker;
pub use traits::{ChunkSpec, Chunker};
