//! Error types for the reconstruction pipeline.
//!
//! Provides a comprehensive error hierarchy using `thiserror` covering
//! storage, chunking, directive parsing, LLM calls, pipeline orchestration,
//! streaming transport, and CLI commands.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the reconstruction pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunking-related errors (text segmentation).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// Directive parsing errors.
    #[error("directive error: {0}")]
    Directive(#[from] DirectiveError),

    /// LLM provider errors.
    #[error("llm error: {0}")]
    Llm(#[from] LlmError),

    /// Job pipeline orchestration errors.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Streaming transport errors (WebSocket protocol).
    #[error("stream error: {0}")]
    Stream(#[from] StreamError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Storage not initialized.
    #[error("pipeline database not initialized. Run: ccrecon init")]
    NotInitialized,

    /// Job not found by ID.
    #[error("job not found: {id}")]
    JobNotFound {
        /// Job ID that was not found.
        id: String,
    },

    /// Chunk not found by ID.
    #[error("chunk not found: {id}")]
    ChunkNotFound {
        /// Chunk ID that was not found.
        id: i64,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Chunking-specific errors for text processing.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Invalid UTF-8 encountered at specific byte offset.
    #[error("invalid UTF-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where invalid UTF-8 was found.
        offset: usize,
    },

    /// Invalid chunk configuration.
    #[error("invalid chunk configuration: {reason}")]
    InvalidConfig {
        /// Reason the configuration is invalid.
        reason: String,
    },

    /// Source text is too short to satisfy the input-length invariant.
    #[error("source text has {actual} words, below the minimum of {minimum}")]
    SourceTooShort {
        /// Actual source word count.
        actual: usize,
        /// Minimum required word count.
        minimum: usize,
    },

    /// Source text exceeds the maximum accepted length.
    #[error("source text has {actual} words, above the maximum of {maximum}")]
    SourceTooLong {
        /// Actual source word count.
        actual: usize,
        /// Maximum accepted word count.
        maximum: usize,
    },

    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),
}

/// Directive-parsing errors.
#[derive(Error, Debug)]
pub enum DirectiveError {
    /// The instruction text could not be parsed into any usable plan.
    #[error("could not derive a reconstruction plan from the instruction")]
    Unparseable,
}

/// LLM provider errors.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure reaching the provider (network, auth, rate limit).
    #[error("llm transport failure: {0}")]
    Transport(String),

    /// The provider returned a response that could not be interpreted.
    #[error("malformed llm response: {message}")]
    MalformedResponse {
        /// Diagnostic message.
        message: String,
        /// Raw response content, for debugging.
        content: String,
    },

    /// The call exceeded its configured timeout.
    #[error("llm call timed out after {seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        seconds: u64,
    },
}

/// Job-pipeline orchestration errors.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Requested input word count falls outside the accepted band.
    #[error("input word count {actual} is out of bounds [{min}, {max}]")]
    InputOutOfBounds {
        /// Actual input word count.
        actual: usize,
        /// Minimum accepted word count.
        min: usize,
        /// Maximum accepted word count.
        max: usize,
    },

    /// A chunk could not be brought into its length band after exhausting retries.
    #[error("chunk {chunk_index} failed length enforcement after {attempts} attempts")]
    ChunkFlagged {
        /// Index of the chunk that failed.
        chunk_index: usize,
        /// Number of continuation attempts made.
        attempts: u32,
    },

    /// A job-level operation was attempted on a job in the wrong state.
    #[error("job {job_id} is in state {state:?}, which does not permit this operation")]
    InvalidTransition {
        /// Job identifier.
        job_id: String,
        /// Current job state.
        state: String,
    },

    /// A chunk exhausted its retry budget on a hard failure.
    #[error("chunk {chunk_index} exhausted retries: {reason}")]
    RetriesExhausted {
        /// Index of the chunk that failed.
        chunk_index: usize,
        /// Last failure reason.
        reason: String,
    },

    /// The job was aborted by client request.
    #[error("job {job_id} was aborted")]
    Aborted {
        /// Job identifier.
        job_id: String,
    },

    /// Resume was requested for a job that already has an active runner.
    #[error("job {job_id} already has an active runner")]
    AlreadyRunning {
        /// Job identifier.
        job_id: String,
    },

    /// An expansion directive produced no sections to generate.
    #[error("expansion directive for job {job_id} produced an empty section plan")]
    EmptySectionPlan {
        /// Job identifier.
        job_id: String,
    },
}

/// Streaming transport / protocol errors.
#[derive(Error, Debug)]
pub enum StreamError {
    /// The client message did not conform to the protocol schema.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// The WebSocket connection closed or errored mid-stream.
    #[error("connection error: {0}")]
    Connection(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Memory mapping error.
    #[error("memory mapping failed: {path}: {reason}")]
    MmapFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// User cancelled operation.
    #[error("operation cancelled by user")]
    Cancelled,

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
