//! Lobby Forge - skill-based matchmaking service
//!
//! Players join a shared waiting pool over HTTP. A background loop groups
//! players of similar skill into lobbies, commits each lobby atomically
//! against the store and notifies the members over their live WebSocket
//! connections.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use connection::{ConnectionRegistry, Notifier, PlayerConnection};
pub use matchmaking::{select_group, MatchCommitter, MatchmakingLoop};
pub use store::{InMemoryStore, LobbyStore, MatchStore, RedisStore, WaitingPool};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
