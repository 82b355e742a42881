use std::sync::Arc;
use tracing::{debug, info, warn};

use super::frame::{Command, OutboundFrame, RoutedFrame};
use crate::error::SessionError;
use crate::session::SessionRegistry;

/// Maps inbound frames onto registry operations
///
/// Holds no per-connection state; the caller supplies the connection id
/// that becomes the session id.
#[derive(Clone)]
pub struct FrameRouter {
    registry: Arc<SessionRegistry>,
}

impl FrameRouter {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Parse and dispatch one text frame. Never fails; errors become error frames.
    pub async fn route(&self, connection_id: &str, text: &str) -> OutboundFrame {
        match RoutedFrame::parse(connection_id, text) {
            Ok(frame) => self.dispatch(frame).await,
            Err(e) => {
                self.registry.touch(connection_id);
                warn!("Rejected frame from {}: {}", connection_id, e);
                OutboundFrame::error(&e)
            }
        }
    }

    pub async fn dispatch(&self, frame: RoutedFrame) -> OutboundFrame {
        let session_id = frame.session_id.as_str();
        let tracked = self.registry.touch(session_id);

        let result = match frame.command {
            Command::Start { user_id, meta_id } => self
                .registry
                .start(session_id, &user_id, meta_id.as_deref())
                .await
                .map(OutboundFrame::Started),
            Command::Data { chunk } => self
                .registry
                .append_data(session_id, &chunk)
                .await
                .map(OutboundFrame::Ack),
            Command::End => {
                info!("End requested by session {}", session_id);
                self.registry
                    .finalize(session_id)
                    .await
                    .map(OutboundFrame::Ended)
            }
            Command::Heartbeat => {
                debug!("Heartbeat from session {}", session_id);
                Ok(OutboundFrame::Heartbeat {
                    session_id: session_id.to_string(),
                    tracked,
                })
            }
        };

        result.unwrap_or_else(|e| OutboundFrame::error(&e))
    }

    /// Finalize whatever the connection left open
    ///
    /// Safe to race with an end frame or the reaper.
    pub async fn connection_closed(&self, connection_id: &str) {
        match self.registry.finalize(connection_id).await {
            Ok(record) => info!(
                "Connection {} closed with recording open; finalized {}",
                connection_id, record.file_name
            ),
            Err(SessionError::NotFound(_)) => {
                debug!("Connection {} closed with no open recording", connection_id)
            }
            Err(e) => warn!("Failed to finalize on close of {}: {}", connection_id, e),
        }
    }
}
