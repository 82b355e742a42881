use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info, warn};

use super::frame::OutboundFrame;
use super::router::FrameRouter;
use crate::error::SessionError;

/// Drive one WebSocket connection until it closes
///
/// The connection id is minted here and never taken from the client. However
/// the connection ends, the session it owned is finalized.
pub async fn handle_socket(socket: WebSocket, router: FrameRouter) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    info!("WebSocket connected: {}", connection_id);

    let (mut ws_tx, mut ws_rx) = socket.split();

    while let Some(msg) = ws_rx.next().await {
        let reply = match msg {
            Ok(Message::Text(text)) => router.route(&connection_id, &text).await,
            Ok(Message::Binary(_)) => {
                router.registry().touch(&connection_id);
                OutboundFrame::error(&SessionError::InvalidFrame(
                    "binary frames are not supported; send JSON text frames".to_string(),
                ))
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Pong replies are sent by axum
                router.registry().touch(&connection_id);
                continue;
            }
            Ok(Message::Close(frame)) => {
                debug!("Close frame from {}: {:?}", connection_id, frame);
                break;
            }
            Err(e) => {
                warn!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        };

        if ws_tx.send(Message::Text(reply.to_text())).await.is_err() {
            warn!("Failed to reply on {}; dropping connection", connection_id);
            break;
        }
    }

    info!("WebSocket disconnected: {}", connection_id);
    router.connection_closed(&connection_id).await;
}
