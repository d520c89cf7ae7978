//! Pipeline tuning configuration.
//!
//! Configuration is resolved in order: explicit values set on the builder →
//! environment variables → defaults, mirroring the teacher's
//! `AgentConfig::from_env` resolution order.

use std::time::Duration;

/// Default model name passed to the LLM provider.
const DEFAULT_MODEL: &str = "reconstruction-default";
/// Default skeleton extraction retry count.
const DEFAULT_SKELETON_RETRIES: u32 = 3;
/// Default chunk transport retry count.
const DEFAULT_CHUNK_RETRIES: u32 = 3;
/// Default length enforcer continuation attempt cap.
const DEFAULT_MAX_CONTINUATION_ATTEMPTS: u32 = 20;
/// Default inter-continuation pause.
const DEFAULT_CONTINUATION_PAUSE_MS: u64 = 300;
/// Default minimum inter-chunk pause.
const DEFAULT_CHUNK_PAUSE_MIN_MS: u64 = 500;
/// Default maximum inter-chunk pause.
const DEFAULT_CHUNK_PAUSE_MAX_MS: u64 = 2000;
/// Default per-observer broadcast buffer size.
const DEFAULT_OBSERVER_BUFFER: usize = 64;
/// Default transport timeout for a single LLM call.
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 600;

/// Tunable parameters for the reconstruction pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model identifier passed to the [`crate::llm::LlmProvider`].
    pub model: String,
    /// Skeleton extraction retries on transport/malformed-response error.
    pub skeleton_retries: u32,
    /// Chunk reconstruction transport retries.
    pub chunk_retries: u32,
    /// Length enforcer continuation attempt cap.
    pub max_continuation_attempts: u32,
    /// Pause between length-enforcer continuation attempts.
    pub continuation_pause: Duration,
    /// Minimum pause between chunks, to smooth provider throttling.
    pub chunk_pause_min: Duration,
    /// Maximum pause between chunks.
    pub chunk_pause_max: Duration,
    /// Bounded send buffer size per stream observer.
    pub observer_buffer: usize,
    /// Per-request LLM transport timeout.
    pub llm_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            skeleton_retries: DEFAULT_SKELETON_RETRIES,
            chunk_retries: DEFAULT_CHUNK_RETRIES,
            max_continuation_attempts: DEFAULT_MAX_CONTINUATION_ATTEMPTS,
            continuation_pause: Duration::from_millis(DEFAULT_CONTINUATION_PAUSE_MS),
            chunk_pause_min: Duration::from_millis(DEFAULT_CHUNK_PAUSE_MIN_MS),
            chunk_pause_max: Duration::from_millis(DEFAULT_CHUNK_PAUSE_MAX_MS),
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
            llm_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }
}

impl PipelineConfig {
    /// Builds configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(v) = std::env::var("CCRECON_MODEL") {
            config.model = v;
        }
        if let Some(v) = env_parsed("CCRECON_SKELETON_RETRIES") {
            config.skeleton_retries = v;
        }
        if let Some(v) = env_parsed("CCRECON_CHUNK_RETRIES") {
            config.chunk_retries = v;
        }
        if let Some(v) = env_parsed("CCRECON_MAX_CONTINUATION_ATTEMPTS") {
            config.max_continuation_attempts = v;
        }
        if let Some(v) = env_parsed::<u64>("CCRECON_OBSERVER_BUFFER") {
            config.observer_buffer = v as usize;
        }
        config
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
