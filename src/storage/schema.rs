//! Database schema definitions.
//!
//! Contains SQL schema and migration logic for the reconstruction
//! pipeline's `SQLite` database.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per reconstruction job.
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    source_text TEXT NOT NULL,
    instruction TEXT NOT NULL,
    directive_plan TEXT NOT NULL,   -- JSON-serialized DirectivePlan
    length_config TEXT NOT NULL,    -- JSON-serialized LengthConfig
    status TEXT NOT NULL,
    current_chunk INTEGER NOT NULL DEFAULT 0,
    total_chunks INTEGER NOT NULL DEFAULT 0,
    retry_count INTEGER NOT NULL DEFAULT 0,
    final_output TEXT,
    error_message TEXT,
    skeleton TEXT,                  -- JSON-serialized GlobalSkeleton, once extracted
    audit_seq INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Chunks belonging to a job, one row per planned segment.
CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    chunk_index INTEGER NOT NULL,
    source_text TEXT NOT NULL,
    target_words INTEGER NOT NULL,
    min_words INTEGER NOT NULL,
    max_words INTEGER NOT NULL,
    status TEXT NOT NULL,
    output_text TEXT,
    actual_words INTEGER,
    retry_count INTEGER NOT NULL DEFAULT 0,
    chunk_delta TEXT,                -- JSON-serialized ChunkDelta
    conflicts_detected INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
    UNIQUE (job_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_chunks_job_order ON chunks(job_id, chunk_index);

-- One stitching pass result per job.
CREATE TABLE IF NOT EXISTS stitch_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    conflicts TEXT NOT NULL,
    term_drift TEXT NOT NULL,
    missing_premises TEXT NOT NULL,
    redundancies TEXT NOT NULL,
    repair_plan TEXT NOT NULL,
    coherence_score REAL NOT NULL,
    verdict TEXT NOT NULL,
    final_output TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE
);

-- Append-only audit log, totally ordered per job by sequence_num.
CREATE TABLE IF NOT EXISTS audit_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL,
    sequence_num INTEGER NOT NULL,
    timestamp INTEGER NOT NULL,
    event_kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
    UNIQUE (job_id, sequence_num)
);

CREATE INDEX IF NOT EXISTS idx_audit_job_seq ON audit_events(job_id, sequence_num);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

/// A schema migration from one version to the next.
pub struct Migration {
    /// Version this migration upgrades from.
    pub from_version: u32,
    /// Version this migration upgrades to.
    pub to_version: u32,
    /// SQL statements to execute.
    pub sql: &'static str,
}

/// Available migrations. Empty today — this crate ships at schema v1 — but
/// kept as a named, versioned list so a v2 migration slots in the same way
/// the initial schema did, rather than requiring an ad hoc `ALTER TABLE`
/// scattered through application code.
pub const MIGRATIONS: &[Migration] = &[];

/// Gets migrations needed to upgrade from a version.
#[must_use]
pub fn get_migrations_from(current_version: u32) -> Vec<&'static Migration> {
    MIGRATIONS
        .iter()
        .filter(|m| m.from_version >= current_version && m.to_version <= CURRENT_SCHEMA_VERSION)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version() {
        const _: () = assert!(CURRENT_SCHEMA_VERSION >= 1);
    }

    #[test]
    fn test_schema_sql_not_empty() {
        assert!(!SCHEMA_SQL.is_empty());
        assert!(SCHEMA_SQL.contains("CREATE TABLE"));
        assert!(SCHEMA_SQL.contains("jobs"));
        assert!(SCHEMA_SQL.contains("audit_events"));
    }

    #[test]
    fn test_get_migrations_from_fresh_install() {
        assert!(get_migrations_from(0).is_empty());
    }
}
