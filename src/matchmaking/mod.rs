//! Matchmaking core
//!
//! Grouping players by skill, committing lobbies against the waiting pool and
//! the background loop that runs it all once per tick.

pub mod committer;
pub mod runner;
pub mod selector;

// Re-export commonly used types
pub use committer::{MatchCommitter, MatchingRules, TickOutcome};
pub use runner::{LoopHandle, LoopState, MatchmakingLoop};
pub use selector::select_group;
