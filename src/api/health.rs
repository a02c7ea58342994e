//! Health reporting
//!
//! Two components are checked: the store (a round-trip check) and the
//! matchmaking loop (must still be running).

use crate::api::ApiState;
use crate::matchmaking::LoopState;
use crate::store::WaitingPool;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form for the health gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 1,
            HealthStatus::Unhealthy => 0,
        }
    }
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when unhealthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Counters reported alongside health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub players_waiting: i64,
    pub live_connections: usize,
    pub lobbies_created: u64,
    pub players_matched: u64,
    pub uptime_seconds: u64,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

impl HealthReport {
    pub async fn check(state: &ApiState) -> Self {
        let checks = vec![Self::check_store(state).await, Self::check_loop(state)];

        let status = if checks.iter().all(|c| c.status == HealthStatus::Healthy) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };

        let uptime = state.started_at.elapsed();
        state.metrics.update_health_status(status.as_gauge());
        state.metrics.set_uptime(uptime);

        let matches = state.metrics.matches();
        let stats = ServiceStats {
            players_waiting: state.metrics.queue().players_waiting.get(),
            live_connections: state.registry.len().await,
            lobbies_created: matches.lobbies_created_total.get(),
            players_matched: matches.players_matched_total.get(),
            uptime_seconds: uptime.as_secs(),
        };

        HealthReport {
            status,
            service: state.service_name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }

    async fn check_store(state: &ApiState) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match state.store.health_check().await {
            Ok(()) => (HealthStatus::Healthy, None),
            Err(e) => {
                debug!("Store health check failed: {}", e);
                (HealthStatus::Unhealthy, Some(e.to_string()))
            }
        };

        ComponentCheck {
            name: "store".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn check_loop(state: &ApiState) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match *state.loop_state.borrow() {
            LoopState::Running => (HealthStatus::Healthy, None),
            LoopState::Stopped => (
                HealthStatus::Unhealthy,
                Some("Matchmaking loop is stopped".to_string()),
            ),
        };

        ComponentCheck {
            name: "matchmaking_loop".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}
