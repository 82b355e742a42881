use super::state::AppState;
use crate::error::SessionError;
use crate::ws;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::{error, info};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

fn error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::NotFound(_) | SessionError::NoActiveSession(_) => StatusCode::NOT_FOUND,
        SessionError::AlreadyActive(_) => StatusCode::CONFLICT,
        SessionError::Decode(_) | SessionError::InvalidFrame(_) => StatusCode::BAD_REQUEST,
        SessionError::StorageUnavailable { .. } | SessionError::WriteFailure { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        SessionError::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws
/// Upgrade to a WebSocket carrying one recording session
pub async fn ws_upgrade(
    upgrade: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| ws::handle_socket(socket, state.router))
}

/// GET /sessions
/// List live sessions
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.snapshot().await)
}

/// GET /sessions/:session_id
/// Get status of a live session
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id).await {
        Some(stats) => (StatusCode::OK, Json(stats)).into_response(),
        None => error_response(&SessionError::NotFound(session_id)),
    }
}

/// POST /sessions/:session_id/finalize
/// Finalize a session from the operator side
pub async fn finalize_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!("Operator finalize requested for session: {}", session_id);

    match state.registry.finalize(&session_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /api/files
/// List finished recording files
pub async fn list_files(State(state): State<AppState>) -> impl IntoResponse {
    let root = &state.registry.storage().recordings_path;

    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (StatusCode::OK, Json(Vec::<String>::new())).into_response();
        }
        Err(e) => {
            error!("Failed to list {}: {}", root.display(), e);
            return error_response(&SessionError::StorageUnavailable {
                path: root.clone(),
                source: e,
            });
        }
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                if is_file {
                    names.push(entry.file_name().to_string_lossy().into_owned());
                }
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read entry in {}: {}", root.display(), e);
                return error_response(&SessionError::StorageUnavailable {
                    path: root.clone(),
                    source: e,
                });
            }
        }
    }
    names.sort();

    (StatusCode::OK, Json(names)).into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
