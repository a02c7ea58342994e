//! Player ID to live connection map
//!
//! All map access goes through one reader/writer lock. `notify` only holds the
//! read guard long enough to clone the handle, so a slow socket never blocks
//! registrations or other deliveries.

use crate::connection::{Notifier, NotifyOutcome, PlayerConnection};
use crate::error::{MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::types::{PlayerId, ServerMessage};
use crate::utils::generate_connection_id;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct RegisteredConnection {
    connection_id: Uuid,
    handle: Arc<dyn PlayerConnection>,
}

/// Live connections of currently connected players, one per player
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<PlayerId, RegisteredConnection>>,
    /// Bounds both the send and the close that follows a failed send
    send_timeout: Duration,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ConnectionRegistry {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            send_timeout,
            metrics: None,
        }
    }

    /// Keep the live connection gauge in step with the map
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn refresh_gauge(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            metrics.set_live_connections(count);
        }
    }

    /// Insert or replace the player's connection. Returns the ID of the new
    /// registration, which the owning task passes back to [`Self::release`].
    pub async fn register(&self, player_id: &str, handle: Arc<dyn PlayerConnection>) -> Uuid {
        let connection_id = generate_connection_id();
        let mut connections = self.connections.write().await;
        let previous = connections.insert(
            player_id.to_string(),
            RegisteredConnection {
                connection_id,
                handle,
            },
        );
        self.refresh_gauge(connections.len());
        drop(connections);

        if previous.is_some() {
            info!(player_id = %player_id, "Replaced existing live connection");
        } else {
            debug!(player_id = %player_id, "Registered live connection");
        }
        connection_id
    }

    /// Remove the player's connection, whichever it is. Idempotent.
    pub async fn unregister(&self, player_id: &str) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(player_id).is_some();
        self.refresh_gauge(connections.len());
        removed
    }

    /// Remove the player's entry only if it is still the given registration
    pub async fn release(&self, player_id: &str, connection_id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let removed = match connections.get(player_id) {
            Some(entry) if entry.connection_id == connection_id => {
                connections.remove(player_id);
                true
            }
            _ => false,
        };
        self.refresh_gauge(connections.len());
        removed
    }

    pub async fn is_connected(&self, player_id: &str) -> bool {
        self.connections.read().await.contains_key(player_id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    async fn deliver(&self, handle: &dyn PlayerConnection, message: &ServerMessage) -> Result<()> {
        match tokio::time::timeout(self.send_timeout, handle.send(message)).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("send timed out after {:?}", self.send_timeout)),
        }
    }

    /// Push `message` to the player if connected.
    ///
    /// A failed or timed-out send evicts the registration that was used and
    /// closes its handle, giving the close the same time limit as the send. The failure is reported through the outcome, never
    /// as an error.
    pub async fn send_to(&self, player_id: &str, message: &ServerMessage) -> NotifyOutcome {
        let target = {
            let connections = self.connections.read().await;
            connections
                .get(player_id)
                .map(|entry| (entry.connection_id, entry.handle.clone()))
        };

        let Some((connection_id, handle)) = target else {
            debug!(player_id = %player_id, "Player not connected, skipping notification");
            return NotifyOutcome::Offline;
        };

        match self.deliver(handle.as_ref(), message).await {
            Ok(()) => NotifyOutcome::Delivered,
            Err(e) => {
                let failure = MatchmakingError::DeliveryFailed {
                    player_id: player_id.to_string(),
                    message: e.to_string(),
                };
                warn!("{}; evicting connection", failure);

                self.release(player_id, connection_id).await;
                if tokio::time::timeout(self.send_timeout, handle.close())
                    .await
                    .is_err()
                {
                    debug!(player_id = %player_id, "Close timed out, dropping connection");
                }
                NotifyOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl Notifier for ConnectionRegistry {
    async fn notify(&self, player_id: &str, lobby_id: &str) -> NotifyOutcome {
        let message = ServerMessage::LobbyCreated {
            lobby_id: lobby_id.to_string(),
        };
        self.send_to(player_id, &message).await
    }
}
