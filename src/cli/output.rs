//! Output formatting: text and JSON renderings of CLI results and errors.

use crate::core::{AuditEvent, Job};
use crate::error::Error;

/// Rendering selected for command output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable plain text.
    Text,
    /// A single JSON document.
    Json,
    /// Newline-delimited JSON, one object per line.
    Ndjson,
}

impl OutputFormat {
    /// Parses a `--format` value, falling back to [`OutputFormat::Text`]
    /// for anything unrecognized rather than failing the whole command.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" => Self::Ndjson,
            _ => Self::Text,
        }
    }
}

/// Renders an error for display, honoring the selected format.
#[must_use]
pub fn format_error(error: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => {
            serde_json::json!({"error": error.to_string()}).to_string()
        }
        OutputFormat::Text => error.to_string(),
    }
}

/// Renders a job's status summary.
#[must_use]
pub fn format_job(job: &Job, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => serde_json::json!({
            "jobId": job.id,
            "status": format!("{:?}", job.status).to_lowercase(),
            "currentChunk": job.current_chunk,
            "totalChunks": job.total_chunks,
            "targetWords": job.length_config.target,
            "errorMessage": job.error_message,
        })
        .to_string(),
        OutputFormat::Text => format!(
            "job {}: {:?} ({}/{} chunks, target {} words){}",
            job.id,
            job.status,
            job.current_chunk,
            job.total_chunks,
            job.length_config.target,
            job.error_message
                .as_ref()
                .map(|m| format!(" — error: {m}"))
                .unwrap_or_default()
        ),
    }
}

/// Renders a job's audit log, one entry per line in `Text`/`Ndjson` mode
/// or one array in `Json` mode.
#[must_use]
pub fn format_audit_events(events: &[AuditEvent], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string(events).unwrap_or_else(|_| "[]".to_string()),
        OutputFormat::Ndjson => events
            .iter()
            .filter_map(|e| serde_json::to_string(e).ok())
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Text => events
            .iter()
            .map(|e| format!("#{} [{}] {:?}: {}", e.sequence_num, e.timestamp, e.event_kind, e.payload))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
