//! Audit log entries: an append-only record of everything that happened
//! to a job, persisted and fanned out live to `/ws/audit` subscribers.

use serde::{Deserialize, Serialize};

use super::current_timestamp;

/// Kind of event recorded in a job's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    /// The job was created.
    JobCreated,
    /// The job transitioned to a new status.
    StatusChanged,
    /// A chunk finished processing (successfully or not).
    ChunkCompleted,
    /// A chunk was retried after a transient failure.
    ChunkRetried,
    /// A shortfall-projection warning was raised.
    Warning,
    /// The stitching pass finished.
    StitchCompleted,
    /// The job was aborted.
    Aborted,
    /// The job failed.
    Failed,
}

/// One append-only audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique identifier (assigned by storage).
    pub id: Option<i64>,
    /// ID of the owning job.
    pub job_id: String,
    /// Strictly monotonic, contiguous sequence number within the job.
    pub sequence_num: u64,
    /// Unix timestamp when the event was recorded.
    pub timestamp: i64,
    /// Kind of event.
    pub event_kind: AuditEventKind,
    /// Event-specific payload, serialized as JSON.
    pub payload: serde_json::Value,
}

impl AuditEvent {
    /// Builds a new audit event. `sequence_num` is assigned by the storage
    /// layer at insert time, inside the same transaction as the row write.
    #[must_use]
    pub fn new(job_id: String, event_kind: AuditEventKind, payload: serde_json::Value) -> Self {
        Self {
            id: None,
            job_id,
            sequence_num: 0,
            timestamp: current_timestamp(),
            event_kind,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_zero_sequence_pending_assignment() {
        let event = AuditEvent::new(
            "j1".into(),
            AuditEventKind::JobCreated,
            serde_json::json!({}),
        );
        assert_eq!(event.sequence_num, 0);
        assert_eq!(event.event_kind, AuditEventKind::JobCreated);
    }
}
