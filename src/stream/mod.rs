//! Streaming transport: WebSocket fan-out of pipeline and audit events.
//!
//! `stream::hub` holds the broadcast channels, `stream::ws` implements
//! the wire protocol, and `stream::server` wires both into an axum
//! application alongside the supplemental HTTP status endpoints.

pub mod hub;
pub mod server;
pub mod ws;

pub use hub::StreamHub;
pub use server::{app, AppState};
