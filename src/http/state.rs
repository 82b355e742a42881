use crate::session::SessionRegistry;
use crate::ws::FrameRouter;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Live recording sessions (connection id → session)
    pub registry: Arc<SessionRegistry>,

    /// Dispatches WebSocket frames into the registry
    pub router: FrameRouter,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            router: FrameRouter::new(Arc::clone(&registry)),
            registry,
        }
    }
}
