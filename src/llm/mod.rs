//! Provider-agnostic LLM call abstraction.
//!
//! Every pipeline component that needs to call a model takes an
//! `Arc<dyn LlmProvider>` as an explicit argument rather than reading
//! process-global configuration, which keeps the pipeline testable with a
//! stub provider.

pub mod message;
pub mod provider;

pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, StopReason};
pub use provider::{LlmProvider, StubLlmProvider};
