//! Live player connections
//!
//! Players hold a WebSocket open while they wait. The registry maps each
//! player to their current socket so the matchmaking loop can push a
//! `lobby_created` message the moment a match commits.

pub mod registry;
pub mod websocket;

use crate::error::Result;
use crate::types::ServerMessage;
use async_trait::async_trait;

pub use registry::ConnectionRegistry;
pub use websocket::{serve_player_socket, WebSocketConnection};

/// Result of pushing one message to one player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// Written to the player's socket
    Delivered,
    /// Player had no live connection
    Offline,
    /// Send failed; the connection was evicted and closed
    Failed,
}

impl NotifyOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOutcome::Delivered => "delivered",
            NotifyOutcome::Offline => "offline",
            NotifyOutcome::Failed => "failed",
        }
    }
}

/// Writable half of a player's live connection
#[async_trait]
pub trait PlayerConnection: Send + Sync {
    async fn send(&self, message: &ServerMessage) -> Result<()>;

    /// Best-effort close; errors are logged by the implementation
    async fn close(&self);
}

/// Delivers lobby notifications to players.
///
/// Delivery problems never surface as errors: a match is final once
/// committed, so callers only learn the outcome for logging and metrics.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, player_id: &str, lobby_id: &str) -> NotifyOutcome;
}
