//! Command execution: wires parsed CLI arguments to storage, the job
//! controller, and the expansion engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

use super::output::{format_audit_events, format_job, OutputFormat};
use super::parser::{Cli, Commands};
use crate::core::JobStatus;
use crate::error::Result;
use crate::expansion;
use crate::io::{read_file, write_file};
use crate::llm::{LlmProvider, StubLlmProvider};
use crate::pipeline::{controller, JobRegistry, PipelineConfig, PipelineEvent};
use crate::storage::{SqliteStorage, Storage};

/// Executes a parsed command, returning the text to write to stdout.
///
/// # Errors
///
/// Returns an error from storage, the pipeline, or the I/O layer, as
/// appropriate to the subcommand.
pub fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    match &cli.command {
        Commands::Init => {
            let mut storage = SqliteStorage::open(&cli.db)?;
            storage.init()?;
            Ok(success_message("database initialized", format))
        }
        Commands::Reset => {
            let mut storage = SqliteStorage::open(&cli.db)?;
            storage.reset()?;
            Ok(success_message("database reset", format))
        }
        Commands::Submit { input, instruction, expand, output } => {
            submit(cli, input.as_deref(), instruction, *expand, output.as_deref(), format)
        }
        Commands::Resume { job_id, output } => resume(cli, job_id, output.as_deref(), format),
        Commands::Status { job_id } => {
            let storage = SqliteStorage::open(&cli.db)?;
            let job = storage
                .get_job(job_id)?
                .ok_or_else(|| crate::error::StorageError::JobNotFound { id: job_id.clone() })?;
            Ok(format_job(&job, format))
        }
        Commands::Show { job_id } => {
            let storage = SqliteStorage::open(&cli.db)?;
            let job = storage
                .get_job(job_id)?
                .ok_or_else(|| crate::error::StorageError::JobNotFound { id: job_id.clone() })?;
            Ok(job.final_output.unwrap_or_else(|| format!("job {job_id} has no final output yet\n")))
        }
        Commands::Abort { job_id } => abort(cli, job_id, format),
        Commands::Audit { job_id } => {
            let storage = SqliteStorage::open(&cli.db)?;
            let events = storage.list_audit_events(job_id)?;
            Ok(format_audit_events(&events, format))
        }
        Commands::Serve { addr } => serve(cli, addr),
    }
}

fn success_message(message: &str, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json | OutputFormat::Ndjson => serde_json::json!({"status": message}).to_string(),
        OutputFormat::Text => message.to_string(),
    }
}

fn submit(
    cli: &Cli,
    input: Option<&std::path::Path>,
    instruction: &str,
    expand: bool,
    output: Option<&std::path::Path>,
    format: OutputFormat,
) -> Result<String> {
    let mut storage = SqliteStorage::open(&cli.db)?;
    storage.init()?;

    let job_id = generate_job_id();
    let (job, chunks) = if expand {
        expansion::prepare_expansion_job(job_id, instruction.to_string())?
    } else {
        let path = input
            .ok_or_else(|| crate::error::CommandError::InvalidArgument("reconstruction requires --input".into()))?;
        let source_text = read_file(path)?;
        controller::prepare_job(job_id, source_text, instruction.to_string())?
    };

    storage.create_job(&job)?;
    storage.create_chunks(&chunks)?;

    run_and_report(&mut storage, &job.id, expand, output, format)
}

fn resume(cli: &Cli, job_id: &str, output: Option<&std::path::Path>, format: OutputFormat) -> Result<String> {
    let mut storage = SqliteStorage::open(&cli.db)?;
    let job = storage
        .get_job(job_id)?
        .ok_or_else(|| crate::error::StorageError::JobNotFound { id: job_id.to_string() })?;
    run_and_report(&mut storage, &job.id, false, output, format)
}

fn run_and_report(
    storage: &mut dyn Storage,
    job_id: &str,
    expand: bool,
    output: Option<&std::path::Path>,
    format: OutputFormat,
) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| crate::error::IoError::ReadFailed { path: "tokio runtime".into(), reason: e.to_string() })?;

    let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::default());
    let registry = JobRegistry::new();
    let config = PipelineConfig::from_env();
    let (events, _rx) = broadcast::channel::<PipelineEvent>(config.observer_buffer);

    let outcome = runtime.block_on(async {
        if expand {
            expansion::run_expansion(storage, &provider, &registry, &events, job_id, &config).await
        } else {
            controller::run_job(storage, &provider, &registry, &events, job_id, &config).await
        }
    })?;

    if let Some(path) = output {
        if let Some(text) = &outcome.job.final_output {
            write_file(path, text)?;
        }
    }

    Ok(format_job(&outcome.job, format))
}

fn abort(cli: &Cli, job_id: &str, format: OutputFormat) -> Result<String> {
    let mut storage = SqliteStorage::open(&cli.db)?;
    let mut job = storage
        .get_job(job_id)?
        .ok_or_else(|| crate::error::StorageError::JobNotFound { id: job_id.to_string() })?;

    if job.status.is_terminal() {
        return Ok(format_job(&job, format));
    }

    job.transition_to(JobStatus::Aborted)?;
    storage.update_job(&job)?;
    storage.append_audit_event(job_id, crate::core::AuditEventKind::Aborted, serde_json::json!({"source": "cli"}))?;
    Ok(format_job(&job, format))
}

fn serve(cli: &Cli, addr: &str) -> Result<String> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| crate::error::IoError::ReadFailed { path: "tokio runtime".into(), reason: e.to_string() })?;

    let provider: Arc<dyn LlmProvider> = Arc::new(StubLlmProvider::default());
    let config = PipelineConfig::from_env();
    let state = crate::stream::AppState::new(&cli.db, provider, config)?;
    let app = crate::stream::app(state);

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| crate::error::IoError::ReadFailed { path: addr.to_string(), reason: e.to_string() })?;
        tracing::info!(%addr, "serving");
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::StreamError::Connection(e.to_string()))?;
        Ok::<(), crate::error::Error>(())
    })?;

    Ok(String::new())
}

fn generate_job_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("job-{}-{n:x}", std::process::id())
}
