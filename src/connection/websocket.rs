//! WebSocket-backed player connections

use crate::connection::{ConnectionRegistry, PlayerConnection};
use crate::error::{MatchmakingError, Result};
use crate::types::ServerMessage;
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Write half of an upgraded socket
pub struct WebSocketConnection {
    player_id: String,
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketConnection {
    pub fn new(player_id: impl Into<String>, sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            player_id: player_id.into(),
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl PlayerConnection for WebSocketConnection {
    async fn send(&self, message: &ServerMessage) -> Result<()> {
        let json = message.to_json()?;
        self.sender
            .lock()
            .await
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| {
                MatchmakingError::DeliveryFailed {
                    player_id: self.player_id.clone(),
                    message: e.to_string(),
                }
                .into()
            })
    }

    async fn close(&self) {
        if let Err(e) = self.sender.lock().await.close().await {
            debug!(player_id = %self.player_id, "Error closing socket: {}", e);
        }
    }
}

/// Drive one player's socket: register, wait for disconnect, clean up.
///
/// Incoming frames carry no meaning; reading only detects the peer going away.
pub async fn serve_player_socket(
    socket: WebSocket,
    player_id: String,
    registry: Arc<ConnectionRegistry>,
) {
    let (sender, receiver) = socket.split();
    let connection = Arc::new(WebSocketConnection::new(player_id.clone(), sender));

    let connection_id = registry.register(&player_id, connection.clone()).await;
    info!(player_id = %player_id, "Player connected");

    wait_for_disconnect(receiver, &player_id).await;

    registry.release(&player_id, connection_id).await;
    connection.close().await;
    info!(player_id = %player_id, "Player disconnected");
}

async fn wait_for_disconnect(mut receiver: SplitStream<WebSocket>, player_id: &str) {
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {
                debug!(player_id = %player_id, "Ignoring inbound frame");
            }
            Err(e) => {
                warn!(player_id = %player_id, "Socket read failed: {}", e);
                break;
            }
        }
    }
}
