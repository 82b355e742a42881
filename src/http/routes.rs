use super::handlers;
use super::state::AppState;
use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    let downloads: Router<AppState> = Router::new()
        .nest_service(
            "/api/download",
            ServeDir::new(&state.registry.storage().recordings_path),
        )
        .layer(middleware::from_fn(attachment_disposition));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Audio ingest
        .route("/ws", get(handlers::ws_upgrade))
        // Session queries
        .route("/sessions", get(handlers::list_sessions))
        .route("/sessions/:session_id", get(handlers::get_session_status))
        .route(
            "/sessions/:session_id/finalize",
            post(handlers::finalize_session),
        )
        // Finished recordings
        .route("/api/files", get(handlers::list_files))
        .merge(downloads)
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve recordings as attachments named after the requested file
async fn attachment_disposition(request: Request, next: Next) -> Response {
    let file_name = request
        .uri()
        .path()
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    let mut response = next.run(request).await;
    if response.status().is_success() && !file_name.is_empty() {
        let value = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
        if let Ok(value) = HeaderValue::from_str(&value) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}
