//! Route handlers

use crate::api::error::ApiError;
use crate::api::health::{HealthReport, HealthStatus};
use crate::api::ApiState;
use crate::connection::serve_player_socket;
use crate::error::MatchmakingError;
use crate::store::{LobbyStore, WaitingPool};
use crate::types::{Lobby, PlayerEntry, QueueRequest};
use crate::utils::current_timestamp;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

/// Acknowledgement for a successful enqueue
#[derive(Debug, Serialize)]
pub struct QueueAck {
    pub message: &'static str,
    #[serde(flatten)]
    pub entry: PlayerEntry,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "service": "lobby-forge",
        "version": crate::VERSION,
        "message": "Matchmaking API is up!",
        "endpoints": [
            "/health",
            "/metrics",
            "/queue",
            "/lobbies/{lobby_id}",
            "/ws/{player_id}"
        ]
    }))
}

pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let report = HealthReport::check(&state).await;
    let status = match report.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}

pub async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

/// `POST /queue`
pub async fn enqueue(
    State(state): State<ApiState>,
    payload: Result<Json<QueueRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<QueueAck>), ApiError> {
    let Json(request) = payload.map_err(|e| {
        state.metrics.record_enqueue_rejected("invalid_payload");
        MatchmakingError::InvalidQueueRequest {
            reason: format!("Invalid JSON payload: {}", e.body_text()),
        }
    })?;

    let entry = request.into_entry(current_timestamp()).inspect_err(|_| {
        state.metrics.record_enqueue_rejected("validation");
    })?;

    state.store.enqueue(entry.clone()).await.inspect_err(|_| {
        state.metrics.record_enqueue_rejected("store");
    })?;

    state.metrics.record_enqueued();
    info!(
        player_id = %entry.player_id,
        skill_rating = entry.skill_rating,
        "Player enqueued"
    );

    Ok((
        StatusCode::CREATED,
        Json(QueueAck {
            message: "Player enqueued successfully",
            entry,
        }),
    ))
}

/// `DELETE /queue/{player_id}`
pub async fn leave(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state.store.remove_all(&[player_id.clone()]).await?;
    if removed == 0 {
        return Err(MatchmakingError::PlayerNotQueued { player_id }.into());
    }

    state.metrics.record_left();
    info!(player_id = %player_id, "Player left the queue");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /queue`
pub async fn queue_snapshot(
    State(state): State<ApiState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let pool = state.store.read_all().await?;
    Ok(Json(json!({ "waiting": pool.len() })))
}

/// `GET /lobbies/{lobby_id}`
pub async fn get_lobby(
    State(state): State<ApiState>,
    Path(lobby_id): Path<String>,
) -> Result<Json<Lobby>, ApiError> {
    match state.store.get_lobby(&lobby_id).await? {
        Some(lobby) => Ok(Json(lobby)),
        None => Err(MatchmakingError::LobbyNotFound { lobby_id }.into()),
    }
}

/// `GET /ws/{player_id}`
pub async fn player_socket(
    State(state): State<ApiState>,
    Path(player_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    if player_id.is_empty() {
        return Err(MatchmakingError::InvalidQueueRequest {
            reason: "player_id is required".to_string(),
        }
        .into());
    }

    debug!(player_id = %player_id, "Upgrading live connection");
    let registry = state.registry.clone();
    Ok(ws
        .on_upgrade(move |socket| serve_player_socket(socket, player_id, registry))
        .into_response())
}
