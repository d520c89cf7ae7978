//! Storage layer for the reconstruction pipeline.
//!
//! Provides persistent storage for job, chunk, stitch, and audit state
//! using `SQLite`, with proper transaction support around every write
//! that must keep multiple rows or a row and a cursor in sync.

pub mod schema;
pub mod sqlite;
pub mod traits;

pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageStats};

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "ccrecon-state.db";

/// Default database path relative to project root.
pub const DEFAULT_DB_PATH: &str = ".ccrecon/ccrecon-state.db";
