//! Bounded-latency wrapper around any store

use crate::error::{MatchmakingError, Result};
use crate::store::{CommitOutcome, LobbyStore, MatchStore, WaitingPool};
use crate::types::{Lobby, PlayerEntry, PlayerId};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Applies one operation timeout to every call of the wrapped store.
///
/// An expired call fails with `StoreTimeout`. The underlying operation may
/// still complete on the server; all multi-key writes are atomic scripts, so
/// it either fully happened or did not.
pub struct TimeoutStore {
    inner: Arc<dyn MatchStore>,
    timeout: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn MatchStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout = ?self.timeout, "Store operation timed out");
                Err(MatchmakingError::StoreTimeout {
                    operation: operation.to_string(),
                }
                .into())
            }
        }
    }
}

#[async_trait]
impl WaitingPool for TimeoutStore {
    async fn enqueue(&self, entry: PlayerEntry) -> Result<()> {
        self.bounded("enqueue", self.inner.enqueue(entry)).await
    }

    async fn remove_all(&self, player_ids: &[PlayerId]) -> Result<usize> {
        self.bounded("remove_all", self.inner.remove_all(player_ids))
            .await
    }

    async fn read_all(&self) -> Result<Vec<PlayerEntry>> {
        self.bounded("read_all", self.inner.read_all()).await
    }

    async fn health_check(&self) -> Result<()> {
        self.bounded("health_check", self.inner.health_check()).await
    }
}

#[async_trait]
impl LobbyStore for TimeoutStore {
    async fn commit_lobby(&self, lobby: &Lobby) -> Result<CommitOutcome> {
        self.bounded("commit_lobby", self.inner.commit_lobby(lobby))
            .await
    }

    async fn get_lobby(&self, lobby_id: &str) -> Result<Option<Lobby>> {
        self.bounded("get_lobby", self.inner.get_lobby(lobby_id))
            .await
    }
}
