//! In-memory store implementation
//!
//! Queue order, player metadata and lobbies live behind one lock, so every
//! operation that touches more than one of them is atomic with respect to
//! readers.

use crate::error::{MatchmakingError, Result};
use crate::store::{CommitOutcome, LobbyStore, WaitingPool};
use crate::types::{Lobby, LobbyId, PlayerEntry, PlayerId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    /// Queue order of player IDs
    order: Vec<PlayerId>,
    /// Metadata for every ID in `order`
    players: HashMap<PlayerId, PlayerEntry>,
    lobbies: HashMap<LobbyId, Lobby>,
}

impl StoreState {
    fn remove_player(&mut self, player_id: &str) -> bool {
        self.order.retain(|id| id != player_id);
        self.players.remove(player_id).is_some()
    }
}

/// Single-process store backed by plain collections
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of players currently queued
    pub async fn queued_count(&self) -> usize {
        self.state.read().await.order.len()
    }

    /// Number of committed lobbies
    pub async fn lobby_count(&self) -> usize {
        self.state.read().await.lobbies.len()
    }
}

#[async_trait]
impl WaitingPool for InMemoryStore {
    async fn enqueue(&self, entry: PlayerEntry) -> Result<()> {
        let mut state = self.state.write().await;

        if state.players.contains_key(&entry.player_id) {
            return Err(MatchmakingError::AlreadyQueued {
                player_id: entry.player_id,
            }
            .into());
        }

        state.order.push(entry.player_id.clone());
        state.players.insert(entry.player_id.clone(), entry);
        Ok(())
    }

    async fn remove_all(&self, player_ids: &[PlayerId]) -> Result<usize> {
        let mut state = self.state.write().await;

        let removed = player_ids
            .iter()
            .filter(|id| state.remove_player(id))
            .count();

        debug!(
            "Removed {}/{} players from in-memory pool",
            removed,
            player_ids.len()
        );
        Ok(removed)
    }

    async fn read_all(&self) -> Result<Vec<PlayerEntry>> {
        let state = self.state.read().await;

        state
            .order
            .iter()
            .map(|id| {
                state.players.get(id).cloned().ok_or_else(|| {
                    MatchmakingError::InternalError {
                        message: format!("Queued player {} has no metadata", id),
                    }
                    .into()
                })
            })
            .collect()
    }
}

#[async_trait]
impl LobbyStore for InMemoryStore {
    async fn commit_lobby(&self, lobby: &Lobby) -> Result<CommitOutcome> {
        let mut state = self.state.write().await;

        let missing: Vec<PlayerId> = lobby
            .player_ids
            .iter()
            .filter(|id| !state.players.contains_key(*id))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Ok(CommitOutcome::Conflict { missing });
        }

        for player_id in &lobby.player_ids {
            state.remove_player(player_id);
        }
        state.lobbies.insert(lobby.lobby_id.clone(), lobby.clone());

        Ok(CommitOutcome::Committed)
    }

    async fn get_lobby(&self, lobby_id: &str) -> Result<Option<Lobby>> {
        Ok(self.state.read().await.lobbies.get(lobby_id).cloned())
    }
}
