//! Test fixtures and fake implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use lobby_forge::connection::{ConnectionRegistry, PlayerConnection};
use lobby_forge::error::{MatchmakingError, Result};
use lobby_forge::matchmaking::{MatchCommitter, MatchingRules};
use lobby_forge::metrics::MetricsCollector;
use lobby_forge::store::{CommitOutcome, InMemoryStore, LobbyStore, WaitingPool};
use lobby_forge::types::{Lobby, PlayerEntry, PlayerId, ServerMessage};
use lobby_forge::utils::current_timestamp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Connection that records every message it is sent
#[derive(Debug, Default)]
pub struct RecordingConnection {
    messages: Mutex<Vec<ServerMessage>>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection whose every send fails
    pub fn broken() -> Self {
        let connection = Self::default();
        connection.fail_sends.store(true, Ordering::SeqCst);
        connection
    }

    pub fn messages(&self) -> Vec<ServerMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PlayerConnection for RecordingConnection {
    async fn send(&self, message: &ServerMessage) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(MatchmakingError::DeliveryFailed {
                player_id: "recording".to_string(),
                message: "connection reset".to_string(),
            }
            .into());
        }
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message.clone());
        }
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// In-memory store whose lobby commits can be made to fail on demand
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_commits: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl WaitingPool for FlakyStore {
    async fn enqueue(&self, entry: PlayerEntry) -> Result<()> {
        self.inner.enqueue(entry).await
    }

    async fn remove_all(&self, player_ids: &[PlayerId]) -> Result<usize> {
        self.inner.remove_all(player_ids).await
    }

    async fn read_all(&self) -> Result<Vec<PlayerEntry>> {
        self.inner.read_all().await
    }
}

#[async_trait]
impl LobbyStore for FlakyStore {
    async fn commit_lobby(&self, lobby: &Lobby) -> Result<CommitOutcome> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(MatchmakingError::StoreFailed {
                message: "transaction aborted".to_string(),
            }
            .into());
        }
        self.inner.commit_lobby(lobby).await
    }

    async fn get_lobby(&self, lobby_id: &str) -> Result<Option<Lobby>> {
        self.inner.get_lobby(lobby_id).await
    }
}

/// Pool entry with a fresh enqueue timestamp
pub fn entry(player_id: &str, skill_rating: i64) -> PlayerEntry {
    PlayerEntry {
        player_id: player_id.to_string(),
        skill_rating,
        enqueued_at: current_timestamp(),
    }
}

/// Enqueue `player_0..player_n` with the given ratings, in order
pub async fn seed_pool(store: &dyn WaitingPool, ratings: &[i64]) -> Vec<PlayerId> {
    let mut ids = Vec::with_capacity(ratings.len());
    for (i, rating) in ratings.iter().enumerate() {
        let player_id = format!("player_{}", i);
        store
            .enqueue(entry(&player_id, *rating))
            .await
            .expect("seed enqueue");
        ids.push(player_id);
    }
    ids
}

/// Committer, registry and metrics wired around the given store
pub fn create_committer(
    store: Arc<dyn lobby_forge::store::MatchStore>,
    max_skill_spread: i64,
) -> (MatchCommitter, Arc<ConnectionRegistry>, Arc<MetricsCollector>) {
    let metrics = Arc::new(MetricsCollector::new().expect("metrics collector"));
    let registry = Arc::new(
        ConnectionRegistry::new(Duration::from_millis(500)).with_metrics(metrics.clone()),
    );
    let rules = MatchingRules {
        lobby_size: 5,
        max_skill_spread,
    };
    let committer = MatchCommitter::new(store, registry.clone(), rules, metrics.clone());
    (committer, registry, metrics)
}
