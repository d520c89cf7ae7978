//! Storage trait definition.
//!
//! Defines the interface persisted job state is read and written through,
//! enabling the job controller and the stream/CLI layers to stay decoupled
//! from any particular database engine.

use crate::core::{AuditEvent, AuditEventKind, ChunkDelta, ChunkRecord, ChunkStatus, GlobalSkeleton, Job, StitchResult};
use crate::error::Result;

/// Trait for persistent storage backends.
///
/// All per-chunk writes that change durable job state (`write_chunk_result`,
/// `append_audit_event`) are expected to be transactional: implementations
/// must not leave a chunk row and its owning job's `current_chunk` cursor
/// out of sync if the process dies mid-write.
pub trait Storage: Send {
    /// Initializes storage (creates schema, runs migrations).
    ///
    /// Idempotent — safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation or migration fails.
    fn init(&mut self) -> Result<()>;

    /// Checks if storage is initialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check cannot be performed.
    fn is_initialized(&self) -> Result<bool>;

    /// Deletes all jobs, chunks, stitch results, and audit events.
    ///
    /// # Errors
    ///
    /// Returns an error if deletion fails.
    fn reset(&mut self) -> Result<()>;

    // ==================== Job operations ====================

    /// Inserts a new job row.
    ///
    /// # Errors
    ///
    /// Returns an error if a job with the same id already exists or the
    /// write fails.
    fn create_job(&mut self, job: &Job) -> Result<()>;

    /// Loads a job by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_job(&self, job_id: &str) -> Result<Option<Job>>;

    /// Persists the full mutable state of a job (status, cursor, retry
    /// count, final output, error message).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::StorageError::JobNotFound`] if the job does
    /// not exist, or another error if the write fails.
    fn update_job(&mut self, job: &Job) -> Result<()>;

    /// Lists all jobs, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_jobs(&self) -> Result<Vec<Job>>;

    /// Persists the job-wide skeleton once extraction succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or the write fails.
    fn save_skeleton(&mut self, job_id: &str, skeleton: &GlobalSkeleton) -> Result<()>;

    /// Loads the job-wide skeleton, if extraction has already completed.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn load_skeleton(&self, job_id: &str) -> Result<Option<GlobalSkeleton>>;

    // ==================== Chunk operations ====================

    /// Inserts the planned (pending) chunk rows for a job, in index order.
    ///
    /// # Errors
    ///
    /// Returns an error if insertion fails.
    fn create_chunks(&mut self, chunks: &[ChunkRecord]) -> Result<()>;

    /// Loads all chunks for a job, ordered by `chunk_index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunks(&self, job_id: &str) -> Result<Vec<ChunkRecord>>;

    /// Loads a single chunk by job id and index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_chunk(&self, job_id: &str, chunk_index: usize) -> Result<Option<ChunkRecord>>;

    /// Single-transaction write setting a chunk's output, delta, and
    /// status, and advancing `job.current_chunk` to `chunk_index + 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if the job or chunk does not exist, or the write
    /// fails.
    fn write_chunk_result(
        &mut self,
        job_id: &str,
        chunk_index: usize,
        output_text: &str,
        word_count: usize,
        delta: &ChunkDelta,
        status: ChunkStatus,
    ) -> Result<()>;

    /// Returns chunk deltas for chunks `[0, upto_index)` in index order,
    /// filtering out chunks with no delta (logging a warning — a complete
    /// chunk with a null delta is a soft error, not a hard failure).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn load_prior_deltas(&self, job_id: &str, upto_index: usize) -> Result<Vec<ChunkDelta>>;

    // ==================== Stitch result operations ====================

    /// Persists the stitcher's output for a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_stitch_result(&mut self, result: &StitchResult) -> Result<i64>;

    /// Loads the stitch result for a job, if the stitcher has run.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn get_stitch_result(&self, job_id: &str) -> Result<Option<StitchResult>>;

    // ==================== Audit log operations ====================

    /// Appends an audit event, assigning the next `sequence_num` for the
    /// job inside the same transaction as the insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the job does not exist or the write fails.
    fn append_audit_event(
        &mut self,
        job_id: &str,
        kind: AuditEventKind,
        payload: serde_json::Value,
    ) -> Result<AuditEvent>;

    /// Lists a job's audit events in `sequence_num` order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    fn list_audit_events(&self, job_id: &str) -> Result<Vec<AuditEvent>>;

    /// Gets storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if statistics cannot be gathered.
    fn stats(&self) -> Result<StorageStats>;
}

/// Storage statistics, surfaced by the CLI `status` command.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct StorageStats {
    /// Number of jobs stored.
    pub job_count: usize,
    /// Total number of chunks across all jobs.
    pub chunk_count: usize,
    /// Number of jobs in a terminal state.
    pub terminal_job_count: usize,
    /// Schema version.
    pub schema_version: u32,
    /// Database file size in bytes (if applicable).
    pub db_size: Option<u64>,
}
