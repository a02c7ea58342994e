//! Persistence contracts for the waiting pool and lobby records
//!
//! The matchmaking core never talks to a storage engine directly. It sees two
//! traits: [`WaitingPool`] (the durable FIFO of queued players) and
//! [`LobbyStore`] (committed lobbies). Both are implemented by an in-memory
//! backend for tests and single-node runs and by a Redis backend for
//! production, and either can be wrapped in [`TimeoutStore`] to bound every call.

pub mod memory;
pub mod redis_store;
pub mod timeout;

use crate::error::Result;
use crate::types::{Lobby, PlayerEntry, PlayerId};
use async_trait::async_trait;

pub use memory::InMemoryStore;
pub use redis_store::{RedisStore, RedisStoreConfig};
pub use timeout::TimeoutStore;

/// Result of trying to commit a lobby against the current pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Players were removed from the pool and the lobby record was written
    Committed,
    /// At least one selected player is no longer queued; nothing was changed
    Conflict { missing: Vec<PlayerId> },
}

/// Durable FIFO of players awaiting a match
#[async_trait]
pub trait WaitingPool: Send + Sync {
    /// Store the entry and append its ID to the queue order.
    ///
    /// Fails with `AlreadyQueued` if the player already has an active membership.
    async fn enqueue(&self, entry: PlayerEntry) -> Result<()>;

    /// Remove the given players from both the order list and the metadata.
    ///
    /// Absent IDs are ignored. Returns how many players were actually removed.
    async fn remove_all(&self, player_ids: &[PlayerId]) -> Result<usize>;

    /// Consistent snapshot of the pool in queue order
    async fn read_all(&self) -> Result<Vec<PlayerEntry>>;

    /// Cheap liveness check against the backing engine
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Committed lobby records
#[async_trait]
pub trait LobbyStore: Send + Sync {
    /// Atomically claim `lobby.player_ids` out of the waiting pool and persist
    /// the lobby. Either every player is removed and the lobby is written, or
    /// nothing changes.
    async fn commit_lobby(&self, lobby: &Lobby) -> Result<CommitOutcome>;

    /// Look up a lobby by ID
    async fn get_lobby(&self, lobby_id: &str) -> Result<Option<Lobby>>;
}

/// Everything the matchmaking service needs from persistence
pub trait MatchStore: WaitingPool + LobbyStore {}

impl<T: WaitingPool + LobbyStore + ?Sized> MatchStore for T {}
