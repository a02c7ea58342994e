//! HTTP and WebSocket surface
//!
//! Queue management, lobby lookup, the live-connection upgrade and the
//! operational endpoints all share one axum router and one listener.

pub mod error;
pub mod handlers;
pub mod health;

use crate::connection::ConnectionRegistry;
use crate::matchmaking::LoopState;
use crate::metrics::MetricsCollector;
use crate::store::MatchStore;
use anyhow::{Context, Result};
use axum::routing::{delete, get};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::ApiError;
pub use health::{HealthReport, HealthStatus};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn MatchStore>,
    pub registry: Arc<ConnectionRegistry>,
    pub metrics: Arc<MetricsCollector>,
    pub loop_state: watch::Receiver<LoopState>,
    pub service_name: String,
    pub started_at: Instant,
}

/// Build the router with all routes
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route(
            "/queue",
            get(handlers::queue_snapshot).post(handlers::enqueue),
        )
        .route("/queue/{player_id}", delete(handlers::leave))
        .route("/lobbies/{lobby_id}", get(handlers::get_lobby))
        .route("/ws/{player_id}", get(handlers::player_socket))
        .with_state(state)
}

/// Bound listener, ready to serve
pub struct ApiServer {
    listener: TcpListener,
}

impl ApiServer {
    /// Bind the listener. Port 0 picks an ephemeral port.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("Invalid HTTP server address")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP server to {}", addr))?;

        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` fires, then drain in-flight requests
    pub async fn serve(self, state: ApiState, shutdown: CancellationToken) -> Result<()> {
        let addr = self.listener.local_addr()?;
        info!("HTTP server listening on http://{}", addr);

        axum::serve(self.listener, create_router(state))
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                info!("HTTP server received shutdown signal, draining connections");
            })
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, LobbyStore, WaitingPool};
    use crate::types::{Lobby, PlayerEntry};
    use crate::utils::current_timestamp;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt; // for oneshot

    fn test_state(store: Arc<InMemoryStore>) -> (ApiState, watch::Sender<LoopState>) {
        let (loop_tx, loop_rx) = watch::channel(LoopState::Running);
        let state = ApiState {
            store,
            registry: Arc::new(ConnectionRegistry::new(Duration::from_secs(1))),
            metrics: Arc::new(MetricsCollector::new().unwrap()),
            loop_state: loop_rx,
            service_name: "lobby-forge-test".to_string(),
            started_at: Instant::now(),
        };
        (state, loop_tx)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_queue(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/queue")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (state, _loop_tx) = test_state(Arc::new(InMemoryStore::new()));
        let response = create_router(state).oneshot(get("/")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Matchmaking API is up!");
        assert_eq!(body["version"], crate::VERSION);
    }

    #[tokio::test]
    async fn test_enqueue_and_snapshot() {
        let store = Arc::new(InMemoryStore::new());
        let (state, _loop_tx) = test_state(store.clone());
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(post_queue(r#"{"player_id":"p1","skill_rating":1500}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["player_id"], "p1");
        assert_eq!(body["skill_rating"], 1500);

        let response = app.oneshot(get("/queue")).await.unwrap();
        assert_eq!(body_json(response).await["waiting"], 1);
        assert_eq!(store.queued_count().await, 1);
    }

    #[tokio::test]
    async fn test_enqueue_validation() {
        let store = Arc::new(InMemoryStore::new());
        let (state, _loop_tx) = test_state(store.clone());
        let app = create_router(state);

        for body in [
            r#"{"player_id":"","skill_rating":1500}"#,
            r#"{"player_id":"p1","skill_rating":0}"#,
            r#"{"player_id":"p1","skill_rating":-5}"#,
            r#"{"player_id":"p1"}"#,
            "not json",
        ] {
            let response = app.clone().oneshot(post_queue(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
        }

        assert_eq!(store.queued_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_enqueue_conflicts() {
        let (state, _loop_tx) = test_state(Arc::new(InMemoryStore::new()));
        let app = create_router(state);
        let body = r#"{"player_id":"p1","skill_rating":1500}"#;

        let first = app.clone().oneshot(post_queue(body)).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(post_queue(body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_leave_queue() {
        let store = Arc::new(InMemoryStore::new());
        store
            .enqueue(PlayerEntry {
                player_id: "p1".to_string(),
                skill_rating: 1500,
                enqueued_at: current_timestamp(),
            })
            .await
            .unwrap();
        let (state, _loop_tx) = test_state(store.clone());
        let app = create_router(state);

        let delete = |uri: &str| {
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(delete("/queue/p1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(store.queued_count().await, 0);

        let response = app.oneshot(delete("/queue/p1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_lobby_lookup() {
        let store = Arc::new(InMemoryStore::new());
        let player = PlayerEntry {
            player_id: "p1".to_string(),
            skill_rating: 1500,
            enqueued_at: current_timestamp(),
        };
        store.enqueue(player.clone()).await.unwrap();
        let lobby = Lobby::from_group("lobby-1".to_string(), &[player], current_timestamp());
        store.commit_lobby(&lobby).await.unwrap();

        let (state, _loop_tx) = test_state(store);
        let app = create_router(state);

        let response = app.clone().oneshot(get("/lobbies/lobby-1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["lobby_id"], "lobby-1");
        assert_eq!(body["player_ids"][0], "p1");

        let response = app.oneshot(get("/lobbies/unknown")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_follows_loop_state() {
        let (state, loop_tx) = test_state(Arc::new(InMemoryStore::new()));
        let metrics = state.metrics.clone();
        let app = create_router(state);

        let response = app.clone().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(metrics.service().health_status.get(), 1);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "lobby-forge-test");

        loop_tx.send_replace(LoopState::Stopped);
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(metrics.service().health_status.get(), 0);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (state, _loop_tx) = test_state(Arc::new(InMemoryStore::new()));
        state.metrics.record_enqueued();
        let app = create_router(state);

        let response = app.oneshot(get("/metrics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("lobby_forge_players_enqueued_total 1"));
    }

    #[tokio::test]
    async fn test_404_handling() {
        let (state, _loop_tx) = test_state(Arc::new(InMemoryStore::new()));
        let response = create_router(state)
            .oneshot(get("/nonexistent"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
