//! `SQLite` storage implementation.
//!
//! Provides persistent storage for job/chunk/stitch/audit state using
//! `SQLite` with transactional writes for every operation that must keep
//! two rows (or a row and a cursor) in sync.

// SQLite stores all integers as i64. These casts are intentional and safe
// because we only ever store non-negative values that fit in usize/u32/u64.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::core::{
    AuditEvent, AuditEventKind, ChunkDelta, ChunkRecord, ChunkStatus, GlobalSkeleton, Job, JobStatus, StitchResult,
};
use crate::directive::DirectivePlan;
use crate::error::{Result, StorageError};
use crate::length::LengthConfig;
use crate::storage::schema::{CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL};
use crate::storage::traits::{Storage, StorageStats};

/// `SQLite`-backed [`Storage`] implementation.
///
/// # Examples
///
/// ```no_run
/// use coherent_reconstruct::storage::{SqliteStorage, Storage};
///
/// let mut storage = SqliteStorage::open("ccrecon-state.db").unwrap();
/// storage.init().unwrap();
/// ```
pub struct SqliteStorage {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStorage {
    /// Opens or creates a `SQLite` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or configured.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }

        let conn = Connection::open(&path).map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", []).map_err(StorageError::from)?;
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Creates an in-memory database, used by tests and one-shot CLI runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        conn.execute("PRAGMA foreign_keys = ON;", []).map_err(StorageError::from)?;
        Ok(Self { conn, path: None })
    }

    /// Returns the database file path (`None` for an in-memory database).
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn get_schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.conn
            .execute(SET_VERSION_SQL, params![version.to_string()])
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
        let directive_plan_json: String = row.get("directive_plan")?;
        let length_config_json: String = row.get("length_config")?;
        let status_str: String = row.get("status")?;

        let directive_plan: DirectivePlan = serde_json::from_str(&directive_plan_json).unwrap_or_default();
        let length_config: LengthConfig =
            serde_json::from_str(&length_config_json).unwrap_or_else(|_| LengthConfig::new(5_000));
        let status = parse_job_status(&status_str);

        Ok(Job {
            id: row.get("id")?,
            source_text: row.get("source_text")?,
            instruction: row.get("instruction")?,
            directive_plan,
            length_config,
            status,
            current_chunk: row.get::<_, i64>("current_chunk")? as usize,
            total_chunks: row.get::<_, i64>("total_chunks")? as usize,
            retry_count: row.get::<_, i64>("retry_count")? as u32,
            final_output: row.get("final_output")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn chunk_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChunkRecord> {
        let status_str: String = row.get("status")?;
        let delta_json: Option<String> = row.get("chunk_delta")?;
        let chunk_delta = delta_json.and_then(|j| serde_json::from_str(&j).ok());

        Ok(ChunkRecord {
            id: Some(row.get("id")?),
            job_id: row.get("job_id")?,
            chunk_index: row.get::<_, i64>("chunk_index")? as usize,
            source_text: row.get("source_text")?,
            target_words: row.get::<_, i64>("target_words")? as usize,
            min_words: row.get::<_, i64>("min_words")? as usize,
            max_words: row.get::<_, i64>("max_words")? as usize,
            status: parse_chunk_status(&status_str),
            output_text: row.get("output_text")?,
            actual_words: row.get::<_, Option<i64>>("actual_words")?.map(|v| v as usize),
            retry_count: row.get::<_, i64>("retry_count")? as u32,
            chunk_delta,
            conflicts_detected: row.get::<_, i64>("conflicts_detected")? != 0,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::SkeletonExtraction => "skeleton_extraction",
        JobStatus::ChunkProcessing => "chunk_processing",
        JobStatus::Stitching => "stitching",
        JobStatus::Complete => "complete",
        JobStatus::Failed => "failed",
        JobStatus::Aborted => "aborted",
    }
}

fn parse_job_status(s: &str) -> JobStatus {
    match s {
        "skeleton_extraction" => JobStatus::SkeletonExtraction,
        "chunk_processing" => JobStatus::ChunkProcessing,
        "stitching" => JobStatus::Stitching,
        "complete" => JobStatus::Complete,
        "failed" => JobStatus::Failed,
        "aborted" => JobStatus::Aborted,
        _ => JobStatus::Pending,
    }
}

fn chunk_status_str(status: ChunkStatus) -> &'static str {
    match status {
        ChunkStatus::Pending => "pending",
        ChunkStatus::Processing => "processing",
        ChunkStatus::Complete => "complete",
        ChunkStatus::Flagged => "flagged",
        ChunkStatus::Failed => "failed",
    }
}

fn parse_chunk_status(s: &str) -> ChunkStatus {
    match s {
        "processing" => ChunkStatus::Processing,
        "complete" => ChunkStatus::Complete,
        "flagged" => ChunkStatus::Flagged,
        "failed" => ChunkStatus::Failed,
        _ => ChunkStatus::Pending,
    }
}

fn audit_kind_str(kind: AuditEventKind) -> &'static str {
    match kind {
        AuditEventKind::JobCreated => "job_created",
        AuditEventKind::StatusChanged => "status_changed",
        AuditEventKind::ChunkCompleted => "chunk_completed",
        AuditEventKind::ChunkRetried => "chunk_retried",
        AuditEventKind::Warning => "warning",
        AuditEventKind::StitchCompleted => "stitch_completed",
        AuditEventKind::Aborted => "aborted",
        AuditEventKind::Failed => "failed",
    }
}

fn parse_audit_kind(s: &str) -> AuditEventKind {
    match s {
        "status_changed" => AuditEventKind::StatusChanged,
        "chunk_completed" => AuditEventKind::ChunkCompleted,
        "chunk_retried" => AuditEventKind::ChunkRetried,
        "warning" => AuditEventKind::Warning,
        "stitch_completed" => AuditEventKind::StitchCompleted,
        "aborted" => AuditEventKind::Aborted,
        "failed" => AuditEventKind::Failed,
        _ => AuditEventKind::JobCreated,
    }
}

fn verdict_str(verdict: crate::core::StitchVerdict) -> &'static str {
    use crate::core::StitchVerdict;
    match verdict {
        StitchVerdict::Coherent => "coherent",
        StitchVerdict::MinorIssues => "minor_issues",
        StitchVerdict::SignificantIssues => "significant_issues",
    }
}

fn parse_verdict(s: &str) -> crate::core::StitchVerdict {
    use crate::core::StitchVerdict;
    match s {
        "coherent" => StitchVerdict::Coherent,
        "significant_issues" => StitchVerdict::SignificantIssues,
        _ => StitchVerdict::MinorIssues,
    }
}

fn join_json(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

fn split_json(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

impl Storage for SqliteStorage {
    fn init(&mut self) -> Result<()> {
        let is_init: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;

        if is_init == 0 {
            self.conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
            self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if let Some(current) = self.get_schema_version()? {
            if current < CURRENT_SCHEMA_VERSION {
                for migration in crate::storage::schema::get_migrations_from(current) {
                    self.conn
                        .execute_batch(migration.sql)
                        .map_err(|e| StorageError::Migration(e.to_string()))?;
                }
                self.set_schema_version(CURRENT_SCHEMA_VERSION)?;
            }
        }

        Ok(())
    }

    fn is_initialized(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0))
            .map_err(StorageError::from)?;
        Ok(count > 0)
    }

    fn reset(&mut self) -> Result<()> {
        self.conn
            .execute_batch(
                r"
            DELETE FROM audit_events;
            DELETE FROM stitch_results;
            DELETE FROM chunks;
            DELETE FROM jobs;
        ",
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn create_job(&mut self, job: &Job) -> Result<()> {
        let directive_plan = serde_json::to_string(&job.directive_plan).map_err(StorageError::from)?;
        let length_config = serde_json::to_string(&job.length_config).map_err(StorageError::from)?;

        self.conn
            .execute(
                r"
            INSERT INTO jobs (
                id, source_text, instruction, directive_plan, length_config,
                status, current_chunk, total_chunks, retry_count,
                final_output, error_message, skeleton, audit_seq,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, ?, ?)
        ",
                params![
                    job.id,
                    job.source_text,
                    job.instruction,
                    directive_plan,
                    length_config,
                    job_status_str(job.status),
                    job.current_chunk as i64,
                    job.total_chunks as i64,
                    job.retry_count as i64,
                    job.final_output,
                    job.error_message,
                    job.created_at,
                    job.updated_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        self.conn
            .query_row("SELECT * FROM jobs WHERE id = ?", params![job_id], Self::job_from_row)
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn update_job(&mut self, job: &Job) -> Result<()> {
        let rows = self
            .conn
            .execute(
                r"
            UPDATE jobs SET status = ?, current_chunk = ?, total_chunks = ?,
                retry_count = ?, final_output = ?, error_message = ?, updated_at = ?
            WHERE id = ?
        ",
                params![
                    job_status_str(job.status),
                    job.current_chunk as i64,
                    job.total_chunks as i64,
                    job.retry_count as i64,
                    job.final_output,
                    job.error_message,
                    job.updated_at,
                    job.id,
                ],
            )
            .map_err(StorageError::from)?;

        if rows == 0 {
            return Err(StorageError::JobNotFound { id: job.id.clone() }.into());
        }
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<Job>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM jobs ORDER BY created_at DESC")
            .map_err(StorageError::from)?;
        let jobs = stmt
            .query_map([], Self::job_from_row)
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;
        Ok(jobs)
    }

    fn save_skeleton(&mut self, job_id: &str, skeleton: &GlobalSkeleton) -> Result<()> {
        let json = serde_json::to_string(skeleton).map_err(StorageError::from)?;
        let rows = self
            .conn
            .execute("UPDATE jobs SET skeleton = ? WHERE id = ?", params![json, job_id])
            .map_err(StorageError::from)?;
        if rows == 0 {
            return Err(StorageError::JobNotFound { id: job_id.to_string() }.into());
        }
        Ok(())
    }

    fn load_skeleton(&self, job_id: &str) -> Result<Option<GlobalSkeleton>> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT skeleton FROM jobs WHERE id = ?", params![job_id], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?
            .flatten();
        Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
    }

    fn create_chunks(&mut self, chunks: &[ChunkRecord]) -> Result<()> {
        let tx = self.conn.transaction().map_err(StorageError::from)?;
        {
            let mut stmt = tx
                .prepare(
                    r"
                INSERT INTO chunks (
                    job_id, chunk_index, source_text, target_words, min_words,
                    max_words, status, output_text, actual_words, retry_count,
                    chunk_delta, conflicts_detected, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, NULL, NULL, 0, NULL, 0, ?, ?)
            ",
                )
                .map_err(StorageError::from)?;
            for chunk in chunks {
                stmt.execute(params![
                    chunk.job_id,
                    chunk.chunk_index as i64,
                    chunk.source_text,
                    chunk.target_words as i64,
                    chunk.min_words as i64,
                    chunk.max_words as i64,
                    chunk_status_str(chunk.status),
                    chunk.created_at,
                    chunk.updated_at,
                ])
                .map_err(StorageError::from)?;
            }
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn get_chunks(&self, job_id: &str) -> Result<Vec<ChunkRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM chunks WHERE job_id = ? ORDER BY chunk_index")
            .map_err(StorageError::from)?;
        let chunks = stmt
            .query_map(params![job_id], Self::chunk_from_row)
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;
        Ok(chunks)
    }

    fn get_chunk(&self, job_id: &str, chunk_index: usize) -> Result<Option<ChunkRecord>> {
        self.conn
            .query_row(
                "SELECT * FROM chunks WHERE job_id = ? AND chunk_index = ?",
                params![job_id, chunk_index as i64],
                Self::chunk_from_row,
            )
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn write_chunk_result(
        &mut self,
        job_id: &str,
        chunk_index: usize,
        output_text: &str,
        word_count: usize,
        delta: &ChunkDelta,
        status: ChunkStatus,
    ) -> Result<()> {
        let delta_json = serde_json::to_string(delta).map_err(StorageError::from)?;
        let now = crate::core::current_timestamp();

        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let updated = tx
            .execute(
                r"
            UPDATE chunks SET output_text = ?, actual_words = ?, chunk_delta = ?,
                status = ?, updated_at = ?
            WHERE job_id = ? AND chunk_index = ?
        ",
                params![output_text, word_count as i64, delta_json, chunk_status_str(status), now, job_id, chunk_index as i64],
            )
            .map_err(StorageError::from)?;
        if updated == 0 {
            return Err(StorageError::ChunkNotFound { id: chunk_index as i64 }.into());
        }

        let job_updated = tx
            .execute(
                "UPDATE jobs SET current_chunk = ?, updated_at = ? WHERE id = ?",
                params![(chunk_index + 1) as i64, now, job_id],
            )
            .map_err(StorageError::from)?;
        if job_updated == 0 {
            return Err(StorageError::JobNotFound { id: job_id.to_string() }.into());
        }

        tx.commit().map_err(StorageError::from)?;

        let verify: Option<String> = self
            .conn
            .query_row(
                "SELECT chunk_delta FROM chunks WHERE job_id = ? AND chunk_index = ?",
                params![job_id, chunk_index as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?
            .flatten();
        if verify.is_none() {
            warn!(job_id, chunk_index, "verification read found null delta after write");
        }

        Ok(())
    }

    fn load_prior_deltas(&self, job_id: &str, upto_index: usize) -> Result<Vec<ChunkDelta>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT chunk_index, chunk_delta, status FROM chunks \
                 WHERE job_id = ? AND chunk_index < ? ORDER BY chunk_index",
            )
            .map_err(StorageError::from)?;

        let rows = stmt
            .query_map(params![job_id, upto_index as i64], |row| {
                let index: i64 = row.get(0)?;
                let delta_json: Option<String> = row.get(1)?;
                let status: String = row.get(2)?;
                Ok((index, delta_json, status))
            })
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;

        let mut deltas = Vec::new();
        for (index, delta_json, status) in rows {
            match delta_json {
                Some(j) => {
                    if let Ok(delta) = serde_json::from_str(&j) {
                        deltas.push(delta);
                    }
                }
                None if status == "complete" || status == "flagged" => {
                    warn!(job_id, chunk_index = index, "complete chunk has a null delta");
                }
                None => {}
            }
        }
        Ok(deltas)
    }

    fn save_stitch_result(&mut self, result: &StitchResult) -> Result<i64> {
        self.conn
            .execute(
                r"
            INSERT INTO stitch_results (
                job_id, conflicts, term_drift, missing_premises, redundancies,
                repair_plan, coherence_score, verdict, final_output, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ",
                params![
                    result.job_id,
                    join_json(&result.conflicts),
                    join_json(&result.term_drift),
                    join_json(&result.missing_premises),
                    join_json(&result.redundancies),
                    join_json(&result.repair_plan),
                    f64::from(result.coherence_score),
                    verdict_str(result.verdict),
                    result.final_output,
                    result.created_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_stitch_result(&self, job_id: &str) -> Result<Option<StitchResult>> {
        self.conn
            .query_row(
                "SELECT * FROM stitch_results WHERE job_id = ? ORDER BY created_at DESC LIMIT 1",
                params![job_id],
                |row| {
                    let score: f64 = row.get("coherence_score")?;
                    let verdict_str: String = row.get("verdict")?;
                    Ok(StitchResult {
                        id: Some(row.get("id")?),
                        job_id: row.get("job_id")?,
                        conflicts: split_json(&row.get::<_, String>("conflicts")?),
                        term_drift: split_json(&row.get::<_, String>("term_drift")?),
                        missing_premises: split_json(&row.get::<_, String>("missing_premises")?),
                        redundancies: split_json(&row.get::<_, String>("redundancies")?),
                        repair_plan: split_json(&row.get::<_, String>("repair_plan")?),
                        coherence_score: score as f32,
                        verdict: parse_verdict(&verdict_str),
                        final_output: row.get("final_output")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()
            .map_err(|e| StorageError::from(e).into())
    }

    fn append_audit_event(
        &mut self,
        job_id: &str,
        kind: AuditEventKind,
        payload: serde_json::Value,
    ) -> Result<AuditEvent> {
        let payload_json = payload.to_string();
        let now = crate::core::current_timestamp();

        let tx = self.conn.transaction().map_err(StorageError::from)?;
        let next_seq: i64 = tx
            .query_row("SELECT audit_seq FROM jobs WHERE id = ?", params![job_id], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?
            .ok_or_else(|| StorageError::JobNotFound { id: job_id.to_string() })?;

        tx.execute(
            "UPDATE jobs SET audit_seq = ? WHERE id = ?",
            params![next_seq + 1, job_id],
        )
        .map_err(StorageError::from)?;

        tx.execute(
            r"
            INSERT INTO audit_events (job_id, sequence_num, timestamp, event_kind, payload)
            VALUES (?, ?, ?, ?, ?)
        ",
            params![job_id, next_seq, now, audit_kind_str(kind), payload_json],
        )
        .map_err(StorageError::from)?;
        tx.commit().map_err(StorageError::from)?;

        Ok(AuditEvent {
            id: Some(self.conn.last_insert_rowid()),
            job_id: job_id.to_string(),
            sequence_num: next_seq as u64,
            timestamp: now,
            event_kind: kind,
            payload,
        })
    }

    fn list_audit_events(&self, job_id: &str) -> Result<Vec<AuditEvent>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM audit_events WHERE job_id = ? ORDER BY sequence_num")
            .map_err(StorageError::from)?;
        let events = stmt
            .query_map(params![job_id], |row| {
                let kind_str: String = row.get("event_kind")?;
                let payload_str: String = row.get("payload")?;
                Ok(AuditEvent {
                    id: Some(row.get("id")?),
                    job_id: row.get("job_id")?,
                    sequence_num: row.get::<_, i64>("sequence_num")? as u64,
                    timestamp: row.get("timestamp")?,
                    event_kind: parse_audit_kind(&kind_str),
                    payload: serde_json::from_str(&payload_str).unwrap_or(serde_json::Value::Null),
                })
            })
            .map_err(StorageError::from)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StorageError::from)?;
        Ok(events)
    }

    fn stats(&self) -> Result<StorageStats> {
        let job_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        let chunk_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))
            .map_err(StorageError::from)?;
        let terminal_job_count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM jobs WHERE status IN ('complete', 'failed', 'aborted')",
                [],
                |row| row.get(0),
            )
            .map_err(StorageError::from)?;
        let schema_version = self.get_schema_version()?.unwrap_or(0);
        let db_size = self.path.as_ref().and_then(|p| std::fs::metadata(p).ok()).map(|m| m.len());

        Ok(StorageStats {
            job_count: job_count as usize,
            chunk_count: chunk_count as usize,
            terminal_job_count: terminal_job_count as usize,
            schema_version,
            db_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::DirectivePlan;
    use crate::length::LengthConfig;

    fn job() -> Job {
        Job::new(
            "job-1".into(),
            "source text".into(),
            "expand".into(),
            DirectivePlan::default(),
            LengthConfig::new(1000),
        )
    }

    fn storage() -> SqliteStorage {
        let mut s = SqliteStorage::in_memory().unwrap();
        s.init().unwrap();
        s
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut s = storage();
        s.init().unwrap();
        assert!(s.is_initialized().unwrap());
    }

    #[test]
    fn test_create_and_get_job_roundtrip() {
        let mut s = storage();
        s.create_job(&job()).unwrap();
        let loaded = s.get_job("job-1").unwrap().unwrap();
        assert_eq!(loaded.id, "job-1");
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[test]
    fn test_update_job_unknown_id_errors() {
        let mut s = storage();
        let result = s.update_job(&job());
        assert!(result.is_err());
    }

    #[test]
    fn test_chunk_roundtrip_and_write_result() {
        let mut s = storage();
        let mut j = job();
        j.total_chunks = 2;
        s.create_job(&j).unwrap();

        let chunks = vec![
            ChunkRecord::new("job-1".into(), 0, "a".into(), 500, 425, 575),
            ChunkRecord::new("job-1".into(), 1, "b".into(), 500, 425, 575),
        ];
        s.create_chunks(&chunks).unwrap();
        assert_eq!(s.get_chunks("job-1").unwrap().len(), 2);

        let delta = ChunkDelta {
            summary: "done".into(),
            ..Default::default()
        };
        s.write_chunk_result("job-1", 0, "output", 500, &delta, ChunkStatus::Complete).unwrap();

        let updated_chunk = s.get_chunk("job-1", 0).unwrap().unwrap();
        assert_eq!(updated_chunk.status, ChunkStatus::Complete);
        assert_eq!(updated_chunk.output_text.as_deref(), Some("output"));

        let updated_job = s.get_job("job-1").unwrap().unwrap();
        assert_eq!(updated_job.current_chunk, 1);
    }

    #[test]
    fn test_load_prior_deltas_filters_nulls() {
        let mut s = storage();
        let mut j = job();
        j.total_chunks = 2;
        s.create_job(&j).unwrap();
        let chunks = vec![
            ChunkRecord::new("job-1".into(), 0, "a".into(), 500, 425, 575),
            ChunkRecord::new("job-1".into(), 1, "b".into(), 500, 425, 575),
        ];
        s.create_chunks(&chunks).unwrap();
        let delta = ChunkDelta {
            claims_introduced: vec!["claim".into()],
            ..Default::default()
        };
        s.write_chunk_result("job-1", 0, "out", 500, &delta, ChunkStatus::Complete).unwrap();

        let deltas = s.load_prior_deltas("job-1", 2).unwrap();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].claims_introduced, vec!["claim"]);
    }

    #[test]
    fn test_audit_sequence_is_monotonic_and_contiguous() {
        let mut s = storage();
        s.create_job(&job()).unwrap();
        let e0 = s.append_audit_event("job-1", AuditEventKind::JobCreated, serde_json::json!({})).unwrap();
        let e1 = s.append_audit_event("job-1", AuditEventKind::StatusChanged, serde_json::json!({})).unwrap();
        assert_eq!(e0.sequence_num, 0);
        assert_eq!(e1.sequence_num, 1);
        let events = s.list_audit_events("job-1").unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence_num, 0);
        assert_eq!(events[1].sequence_num, 1);
    }

    #[test]
    fn test_skeleton_roundtrip() {
        let mut s = storage();
        s.create_job(&job()).unwrap();
        assert!(s.load_skeleton("job-1").unwrap().is_none());
        let skeleton = GlobalSkeleton {
            sections: vec![crate::core::SkeletonSection {
                id: 0,
                title: "Intro".into(),
                claims: vec![],
                target_words: 500,
                terms: vec![],
                related_section_ids: vec![],
            }],
        };
        s.save_skeleton("job-1", &skeleton).unwrap();
        let loaded = s.load_skeleton("job-1").unwrap().unwrap();
        assert_eq!(loaded.sections.len(), 1);
    }

    #[test]
    fn test_stats_reflects_counts() {
        let mut s = storage();
        s.create_job(&job()).unwrap();
        let stats = s.stats().unwrap();
        assert_eq!(stats.job_count, 1);
        assert_eq!(stats.chunk_count, 0);
    }

    #[test]
    fn test_reset_clears_all_tables() {
        let mut s = storage();
        s.create_job(&job()).unwrap();
        s.reset().unwrap();
        assert!(s.get_job("job-1").unwrap().is_none());
    }
}
