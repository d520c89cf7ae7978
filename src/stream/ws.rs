//! WebSocket handlers for `/ws/cc-stream` and `/ws/audit`.
//!
//! Each accepted connection is split into a forwarding task (hub events
//! out to the socket) and a receive loop (client commands in). The
//! forwarding task is spawned per subscription so a slow client never
//! blocks the job runner — it only risks lagging its own broadcast
//! receiver, which `tokio::sync::broadcast` reports rather than stalls on.
//!
//! Every job run opens its own [`SqliteStorage`] connection rather than
//! sharing one behind a mutex: `run_job` holds its storage handle for the
//! whole run, and the concurrency model calls for multiple jobs running
//! at once, each the sole writer of its own rows.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{AuditEvent, Job};
use crate::pipeline::{controller, PipelineEvent};
use crate::storage::Storage;
use crate::stream::server::AppState;

/// Client→server message accepted on `/ws/cc-stream`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum ClientMessage {
    /// Submit a new reconstruction job.
    StartJob {
        /// Source document text.
        text: String,
        /// Free-text transformation instructions.
        #[serde(default)]
        custom_instructions: Option<String>,
        /// Free-text audience description.
        #[serde(default)]
        audience_parameters: Option<String>,
        /// Free-text rigor/formality level.
        #[serde(default)]
        rigor_level: Option<String>,
    },
    /// Request cooperative abort of a running job.
    AbortJob {
        /// Job identifier.
        job_id: String,
    },
    /// Resume a previously interrupted job.
    ResumeJob {
        /// Job identifier.
        job_id: String,
    },
    /// Request a one-shot status snapshot for a job.
    GetStatus {
        /// Job identifier.
        job_id: String,
    },
}

/// Server→client status snapshot, sent in reply to `get_status` and used
/// by the `GET /jobs/:id` HTTP endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    job_id: String,
    status: String,
    current_chunk: usize,
    total_chunks: usize,
    target_words: usize,
    final_output: Option<String>,
    error_message: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: format!("{:?}", job.status).to_lowercase(),
            current_chunk: job.current_chunk,
            total_chunks: job.total_chunks,
            target_words: job.length_config.target,
            final_output: job.final_output.clone(),
            error_message: job.error_message.clone(),
        }
    }
}

/// Upgrades a connection and runs the `/ws/cc-stream` protocol.
pub async fn cc_stream_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| cc_stream_session(socket, state))
}

async fn cc_stream_session(socket: WebSocket, state: AppState) {
    let (mut sink, mut source) = socket.split();

    // One forwarding task per job the client starts or resumes in this
    // session relays hub events onto this channel; the select loop below
    // only multiplexes them onto the single socket.
    let (forward_tx, mut forward_rx) = tokio::sync::mpsc::channel::<String>(64);

    loop {
        tokio::select! {
            forwarded = forward_rx.recv() => {
                match forwarded {
                    Some(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = source.next() => {
                let Some(Ok(Message::Text(text))) = incoming else {
                    break;
                };
                let Ok(cmd) = serde_json::from_str::<ClientMessage>(&text) else {
                    send_error(&forward_tx, "could not parse client message".to_string()).await;
                    continue;
                };
                handle_client_message(cmd, &state, &forward_tx).await;
            }
        }
    }
}

async fn handle_client_message(
    cmd: ClientMessage,
    state: &AppState,
    forward_tx: &tokio::sync::mpsc::Sender<String>,
) {
    match cmd {
        ClientMessage::StartJob {
            text,
            custom_instructions,
            audience_parameters,
            rigor_level,
        } => {
            let instruction = combine_instruction(custom_instructions, audience_parameters, rigor_level);
            let job_id = generate_job_id();
            match controller::prepare_job(job_id.clone(), text, instruction) {
                Ok((job, chunks)) => match state.open_storage() {
                    Ok(mut storage) => {
                        if let Err(e) = storage.create_job(&job).and_then(|()| storage.create_chunks(&chunks)) {
                            send_error(forward_tx, e.to_string()).await;
                            return;
                        }
                        spawn_job_run(state.clone(), job_id, forward_tx.clone());
                    }
                    Err(e) => send_error(forward_tx, e.to_string()).await,
                },
                Err(e) => send_error(forward_tx, e.to_string()).await,
            }
        }
        ClientMessage::ResumeJob { job_id } => match state.open_storage().and_then(|s| s.get_job(&job_id)) {
            Ok(Some(job)) if !job.status.is_terminal() => {
                spawn_job_run(state.clone(), job_id, forward_tx.clone());
            }
            Ok(Some(job)) => send_status(forward_tx, &job).await,
            Ok(None) => send_error(forward_tx, format!("job not found: {job_id}")).await,
            Err(e) => send_error(forward_tx, e.to_string()).await,
        },
        ClientMessage::AbortJob { job_id } => {
            if let Err(e) = state.registry.request_abort(&job_id).await {
                send_error(forward_tx, e.to_string()).await;
            }
        }
        ClientMessage::GetStatus { job_id } => match state.open_storage().and_then(|s| s.get_job(&job_id)) {
            Ok(Some(job)) => send_status(forward_tx, &job).await,
            Ok(None) => send_error(forward_tx, format!("job not found: {job_id}")).await,
            Err(e) => send_error(forward_tx, e.to_string()).await,
        },
    }
}

/// Spawns the job runner on its own storage connection and relays every
/// hub event for `job_id` onto `forward_tx` until the run reaches a
/// terminal state.
fn spawn_job_run(state: AppState, job_id: String, forward_tx: tokio::sync::mpsc::Sender<String>) {
    tokio::spawn(async move {
        let mut rx = state.hub.subscribe_job(&job_id).await;
        let events = state.hub.job_sender(&job_id).await;

        let runner = {
            let state = state.clone();
            let job_id = job_id.clone();
            let events = events.clone();
            tokio::spawn(async move {
                match state.open_storage() {
                    Ok(mut storage) => {
                        if let Err(e) =
                            controller::run_job(&mut storage, &state.provider, &state.registry, &events, &job_id, &state.config)
                                .await
                        {
                            warn!(job_id = %job_id, error = %e, "job run returned an error");
                        }
                    }
                    Err(e) => warn!(job_id = %job_id, error = %e, "failed to open storage for job run"),
                }
                state.hub.retire_job(&job_id).await;
            })
        };

        while let Ok(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if forward_tx.send(text).await.is_err() {
                break;
            }
            if matches!(
                event,
                PipelineEvent::JobComplete { .. } | PipelineEvent::JobFailed { .. } | PipelineEvent::JobAborted { .. }
            ) {
                break;
            }
        }
        let _ = runner.await;
    });
}

async fn send_error(forward_tx: &tokio::sync::mpsc::Sender<String>, message: String) {
    let event = PipelineEvent::Error { message };
    if let Ok(text) = serde_json::to_string(&event) {
        let _ = forward_tx.send(text).await;
    }
}

async fn send_status(forward_tx: &tokio::sync::mpsc::Sender<String>, job: &Job) {
    let snapshot = JobStatusResponse::from(job);
    if let Ok(text) = serde_json::to_string(&serde_json::json!({"type": "status", "job": snapshot})) {
        let _ = forward_tx.send(text).await;
    }
}

fn combine_instruction(
    custom_instructions: Option<String>,
    audience_parameters: Option<String>,
    rigor_level: Option<String>,
) -> String {
    let mut parts = Vec::new();
    if let Some(c) = custom_instructions {
        parts.push(c);
    }
    if let Some(a) = audience_parameters {
        parts.push(format!("audience: {a}"));
    }
    if let Some(r) = rigor_level {
        parts.push(format!("rigor: {r}"));
    }
    parts.join(". ")
}

/// Generates a process-unique job identifier without relying on a UUID
/// dependency the rest of the pipeline has no other use for.
fn generate_job_id() -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("job-{}-{n:x}", std::process::id())
}

/// Client→server message accepted on `/ws/audit`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum AuditClientMessage {
    /// Subscribe to a job's audit trail: a history snapshot followed by
    /// live entries until the job reaches a terminal state.
    Subscribe {
        /// Job identifier (the audit log is one-per-job).
        audit_log_id: String,
    },
}

/// Upgrades a connection and runs the `/ws/audit` protocol.
pub async fn audit_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| audit_session(socket, state))
}

async fn audit_session(mut socket: WebSocket, state: AppState) {
    let Some(Ok(Message::Text(text))) = socket.recv().await else {
        return;
    };
    let Ok(AuditClientMessage::Subscribe { audit_log_id: job_id }) = serde_json::from_str::<AuditClientMessage>(&text) else {
        let payload = serde_json::json!({"type": "error", "message": "expected subscribe"});
        let _ = socket.send(Message::Text(serde_json::to_string(&payload).unwrap_or_default().into())).await;
        return;
    };

    let history = load_audit_events(&state, &job_id);
    let mut last_seen = history.iter().map(|e| e.sequence_num).max();
    if send_history(&mut socket, &history).await.is_err() {
        return;
    }

    let mut rx = state.hub.subscribe_job(&job_id).await;
    loop {
        let Ok(event) = rx.recv().await else {
            break;
        };
        let new_events = load_audit_events(&state, &job_id);
        let fresh: Vec<&AuditEvent> = new_events
            .iter()
            .filter(|e| last_seen.is_none_or(|seen| e.sequence_num > seen))
            .collect();
        for entry in &fresh {
            last_seen = Some(last_seen.map_or(entry.sequence_num, |s| s.max(entry.sequence_num)));
            if send_entry(&mut socket, entry).await.is_err() {
                return;
            }
        }
        if matches!(
            event,
            PipelineEvent::JobComplete { .. } | PipelineEvent::JobFailed { .. } | PipelineEvent::JobAborted { .. }
        ) {
            let payload = serde_json::json!({"type": "completed"});
            let _ = socket.send(Message::Text(serde_json::to_string(&payload).unwrap_or_default().into())).await;
            break;
        }
    }
}

fn load_audit_events(state: &AppState, job_id: &str) -> Vec<AuditEvent> {
    state
        .open_storage()
        .and_then(|s| s.list_audit_events(job_id))
        .unwrap_or_default()
}

async fn send_history(socket: &mut WebSocket, history: &[AuditEvent]) -> Result<(), axum::Error> {
    let payload = serde_json::json!({"type": "history", "entries": history});
    socket.send(Message::Text(serde_json::to_string(&payload).unwrap_or_default().into())).await
}

async fn send_entry(socket: &mut WebSocket, entry: &AuditEvent) -> Result<(), axum::Error> {
    let payload = serde_json::json!({"type": "entry", "entry": entry});
    socket.send(Message::Text(serde_json::to_string(&payload).unwrap_or_default().into())).await
}
