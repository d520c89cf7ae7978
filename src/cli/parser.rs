//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Coherent document reconstruction pipeline: submit, resume, and inspect
/// reconstruction and expansion jobs, or run the streaming server.
#[derive(Debug, Parser)]
#[command(name = "ccrecon", version, about)]
pub struct Cli {
    /// Path to the sqlite database file.
    #[arg(long, global = true, default_value = crate::storage::DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Output format: `text`, `json`, or `ndjson`.
    #[arg(long, global = true, default_value = "text")]
    pub format: String,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Creates the database and its schema if they do not already exist.
    Init,

    /// Deletes all jobs, chunks, stitch results, and audit events.
    Reset,

    /// Submits a new job and runs it to completion (or failure/abort).
    Submit {
        /// Path to the source document (required for reconstruction, ignored for expansion).
        #[arg(long)]
        input: Option<PathBuf>,

        /// Free-text instruction describing the desired transformation or expansion.
        #[arg(long)]
        instruction: String,

        /// Runs the Universal Expansion Engine instead of chunked reconstruction.
        #[arg(long)]
        expand: bool,

        /// Writes the final output to this path instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Prints a job's current status.
    Status {
        /// Job identifier.
        job_id: String,
    },

    /// Prints a job's final output text, once complete.
    Show {
        /// Job identifier.
        job_id: String,
    },

    /// Resumes a job from its last persisted chunk cursor.
    Resume {
        /// Job identifier.
        job_id: String,

        /// Writes the final output to this path instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Marks a non-terminal job as aborted without running it further.
    Abort {
        /// Job identifier.
        job_id: String,
    },

    /// Prints a job's audit log.
    Audit {
        /// Job identifier.
        job_id: String,
    },

    /// Starts the streaming WebSocket server.
    Serve {
        /// Address to bind, e.g. `127.0.0.1:8080`.
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}
