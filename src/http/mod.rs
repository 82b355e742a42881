//! HTTP server for audio ingest and operator queries
//!
//! This module exposes:
//! - GET /ws - WebSocket endpoint carrying one recording per connection
//! - GET /sessions - List live sessions
//! - GET /sessions/:id - Query one live session
//! - POST /sessions/:id/finalize - Finalize a session from the operator side
//! - GET /api/files - List finished recording files
//! - GET /api/download/:file_name - Download a recording
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
