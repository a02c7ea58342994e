//! Utility functions for the matchmaking service

use crate::types::LobbyId;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique lobby ID
pub fn generate_lobby_id() -> LobbyId {
    Uuid::new_v4().to_string()
}

/// Generate a new unique live-connection ID
pub fn generate_connection_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Seconds elapsed since `since`, clamped at zero
pub fn seconds_since(since: DateTime<Utc>) -> f64 {
    let elapsed = current_timestamp() - since;
    (elapsed.num_milliseconds().max(0) as f64) / 1000.0
}
