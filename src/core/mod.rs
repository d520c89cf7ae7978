//! Core domain models for the reconstruction pipeline.
//!
//! This module contains the fundamental data structures shared by the
//! storage layer, the pipeline components, and the streaming transport:
//! jobs, chunks, the global skeleton, chunk deltas, stitch results, and
//! audit events. These are pure domain models with no I/O dependencies.

pub mod audit;
pub mod chunk;
pub mod delta;
pub mod job;
pub mod skeleton;
pub mod stitch;

pub use audit::{AuditEvent, AuditEventKind};
pub use chunk::{ChunkRecord, ChunkStatus};
pub use delta::ChunkDelta;
pub use job::{Job, JobStatus};
pub use skeleton::{GlobalSkeleton, SkeletonSection};
pub use stitch::{StitchResult, StitchVerdict};

/// Returns the current Unix timestamp in seconds.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
