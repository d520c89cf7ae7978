//! Axum application wiring: shared state, HTTP routes, and the two
//! WebSocket upgrade routes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::error::Result;
use crate::llm::LlmProvider;
use crate::pipeline::{JobRegistry, PipelineConfig};
use crate::storage::{SqliteStorage, Storage};
use crate::stream::hub::StreamHub;
use crate::stream::ws::{audit_handler, cc_stream_handler, JobStatusResponse};

/// Shared application state handed to every axum handler.
///
/// Storage is not held open here — each request or job run opens its own
/// [`SqliteStorage`] connection against `db_path`, matching the "shared
/// connection pool, one writer per job" concurrency model: `SQLite`'s WAL
/// mode lets independent connections read and write the same file
/// without a process-wide lock serializing unrelated jobs.
#[derive(Clone)]
pub struct AppState {
    db_path: PathBuf,
    /// LLM backend used by every job run.
    pub provider: Arc<dyn LlmProvider>,
    /// Process-wide active-runner registry.
    pub registry: JobRegistry,
    /// Per-job event fan-out.
    pub hub: StreamHub,
    /// Pipeline tuning parameters.
    pub config: PipelineConfig,
}

impl AppState {
    /// Builds application state backed by the database at `db_path`,
    /// initializing its schema if this is the first run.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl AsRef<Path>, provider: Arc<dyn LlmProvider>, config: PipelineConfig) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let mut storage = SqliteStorage::open(&db_path)?;
        storage.init()?;
        Ok(Self {
            db_path,
            provider,
            registry: JobRegistry::new(),
            hub: StreamHub::new(config.observer_buffer),
            config,
        })
    }

    /// Opens a fresh connection to the shared database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened.
    pub fn open_storage(&self) -> Result<SqliteStorage> {
        SqliteStorage::open(&self.db_path)
    }
}

/// Builds the full axum router: the two WebSocket routes plus the
/// supplemental liveness and status-query HTTP endpoints.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/jobs/{id}", get(get_job_status))
        .route("/ws/cc-stream", get(cc_stream_handler))
        .route("/ws/audit", get(audit_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn get_job_status(State(state): State<AppState>, AxumPath(id): AxumPath<String>) -> impl IntoResponse {
    match state.open_storage().and_then(|storage| storage.get_job(&id)) {
        Ok(Some(job)) => Json(serde_json::json!({"job": JobStatusResponse::from(&job)})).into_response(),
        Ok(None) => (axum::http::StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "job not found"}))).into_response(),
        Err(e) => (
            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}
