//! Error types for the matchmaking service
//!
//! Components return `anyhow` errors that wrap a [`MatchmakingError`], so callers
//! that care about the failure class (the HTTP layer, the matchmaking loop) can
//! downcast while everything else just propagates with `?`.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Invalid queue request: {reason}")]
    InvalidQueueRequest { reason: String },

    #[error("Player already queued: {player_id}")]
    AlreadyQueued { player_id: String },

    #[error("Store operation failed: {message}")]
    StoreFailed { message: String },

    #[error("Store operation timed out: {operation}")]
    StoreTimeout { operation: String },

    #[error("Lobby not found: {lobby_id}")]
    LobbyNotFound { lobby_id: String },

    #[error("Player not queued: {player_id}")]
    PlayerNotQueued { player_id: String },

    #[error("Delivery to player {player_id} failed: {message}")]
    DeliveryFailed { player_id: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

/// Broad failure class, used to pick HTTP status codes and log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Store,
    Delivery,
    Internal,
}

impl MatchmakingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatchmakingError::InvalidQueueRequest { .. } => ErrorKind::Validation,
            MatchmakingError::AlreadyQueued { .. } => ErrorKind::Conflict,
            MatchmakingError::StoreFailed { .. } | MatchmakingError::StoreTimeout { .. } => {
                ErrorKind::Store
            }
            MatchmakingError::LobbyNotFound { .. } | MatchmakingError::PlayerNotQueued { .. } => {
                ErrorKind::NotFound
            }
            MatchmakingError::DeliveryFailed { .. } => ErrorKind::Delivery,
            MatchmakingError::ConfigurationError { .. } | MatchmakingError::InternalError { .. } => {
                ErrorKind::Internal
            }
        }
    }
}

/// Classify an arbitrary error, treating anything unknown as internal
pub fn error_kind(error: &anyhow::Error) -> ErrorKind {
    error
        .downcast_ref::<MatchmakingError>()
        .map(MatchmakingError::kind)
        .unwrap_or(ErrorKind::Internal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        let err: anyhow::Error = MatchmakingError::LobbyNotFound {
            lobby_id: "abc".to_string(),
        }
        .into();
        assert_eq!(error_kind(&err), ErrorKind::NotFound);

        let err: anyhow::Error = MatchmakingError::StoreTimeout {
            operation: "read_all".to_string(),
        }
        .into();
        assert_eq!(error_kind(&err), ErrorKind::Store);

        let err = anyhow::anyhow!("something else");
        assert_eq!(error_kind(&err), ErrorKind::Internal);
    }

    #[test]
    fn test_error_messages() {
        let err = MatchmakingError::AlreadyQueued {
            player_id: "p1".to_string(),
        };
        assert_eq!(err.to_string(), "Player already queued: p1");
    }
}
