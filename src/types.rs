//! Common types used throughout the matchmaking service

use crate::error::{MatchmakingError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for lobbies
pub type LobbyId = String;

/// Skill rating supplied by the caller; always positive once validated
pub type SkillRating = i64;

/// Request body for joining the waiting pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueRequest {
    pub player_id: PlayerId,
    pub skill_rating: SkillRating,
}

impl QueueRequest {
    /// Reject empty player IDs and non-positive ratings
    pub fn validate(&self) -> Result<()> {
        if self.player_id.is_empty() {
            return Err(MatchmakingError::InvalidQueueRequest {
                reason: "player_id is required".to_string(),
            }
            .into());
        }

        if self.skill_rating <= 0 {
            return Err(MatchmakingError::InvalidQueueRequest {
                reason: "skill_rating must be > 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Validate and turn the request into a pool entry stamped with `now`
    pub fn into_entry(self, now: DateTime<Utc>) -> Result<PlayerEntry> {
        self.validate()?;
        Ok(PlayerEntry {
            player_id: self.player_id,
            skill_rating: self.skill_rating,
            enqueued_at: now,
        })
    }
}

/// A player waiting in the pool. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub player_id: PlayerId,
    pub skill_rating: SkillRating,
    #[serde(default = "crate::utils::current_timestamp")]
    pub enqueued_at: DateTime<Utc>,
}

/// Immutable record of a committed match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    pub lobby_id: LobbyId,
    pub player_ids: Vec<PlayerId>,
    #[serde(default)]
    pub skill_spread: SkillRating,
    #[serde(default = "crate::utils::current_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Lobby {
    /// Build a lobby from a selected group, keeping selection order
    pub fn from_group(lobby_id: LobbyId, group: &[PlayerEntry], created_at: DateTime<Utc>) -> Self {
        let skill_spread = match (group.first(), group.last()) {
            (Some(first), Some(last)) => last.skill_rating - first.skill_rating,
            _ => 0,
        };

        Self {
            lobby_id,
            player_ids: group.iter().map(|p| p.player_id.clone()).collect(),
            skill_spread,
            created_at,
        }
    }
}

/// Messages pushed to players over their live connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    LobbyCreated { lobby_id: LobbyId },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to serialize server message: {}", e),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::current_timestamp;

    #[test]
    fn test_queue_request_validation() {
        let ok = QueueRequest {
            player_id: "p1".to_string(),
            skill_rating: 1500,
        };
        assert!(ok.validate().is_ok());

        let empty_id = QueueRequest {
            player_id: "".to_string(),
            skill_rating: 1500,
        };
        assert!(empty_id.validate().is_err());

        // Only the empty string is rejected
        let spaces = QueueRequest {
            player_id: "  ".to_string(),
            skill_rating: 1500,
        };
        assert!(spaces.validate().is_ok());

        let zero_rating = QueueRequest {
            player_id: "p1".to_string(),
            skill_rating: 0,
        };
        let err = zero_rating.validate().unwrap_err();
        assert!(err.to_string().contains("skill_rating"));
    }

    #[test]
    fn test_lobby_created_wire_format() {
        let message = ServerMessage::LobbyCreated {
            lobby_id: "abc-123".to_string(),
        };
        let json: serde_json::Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();

        assert_eq!(json["type"], "lobby_created");
        assert_eq!(json["lobby_id"], "abc-123");
    }

    #[test]
    fn test_lobby_from_group_keeps_order_and_spread() {
        let now = current_timestamp();
        let group: Vec<PlayerEntry> = [("a", 1400), ("b", 1420), ("c", 1490)]
            .iter()
            .map(|(id, rating)| PlayerEntry {
                player_id: id.to_string(),
                skill_rating: *rating,
                enqueued_at: now,
            })
            .collect();

        let lobby = Lobby::from_group("lobby-1".to_string(), &group, now);
        assert_eq!(lobby.player_ids, vec!["a", "b", "c"]);
        assert_eq!(lobby.skill_spread, 90);
    }

    #[test]
    fn test_player_entry_accepts_legacy_document() {
        let entry: PlayerEntry =
            serde_json::from_str(r#"{"player_id":"p1","skill_rating":1500}"#).unwrap();
        assert_eq!(entry.player_id, "p1");
        assert_eq!(entry.skill_rating, 1500);
    }
}
