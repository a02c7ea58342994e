//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the lobby-forge matchmaking
//! service. Every collector owns a private registry so tests and multiple
//! service instances never collide on metric names.

use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Waiting pool metrics
    queue_metrics: QueueMetrics,

    /// Matchmaking tick and lobby metrics
    match_metrics: MatchMetrics,

    /// Live connection and notification metrics
    connection_metrics: ConnectionMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=healthy)
    pub health_status: IntGauge,
}

/// Waiting pool metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Players accepted into the pool
    pub players_enqueued_total: IntCounter,

    /// Players that left the pool before being matched
    pub players_left_total: IntCounter,

    /// Enqueue requests rejected, by reason
    pub enqueue_rejected_total: IntCounterVec,

    /// Pool size observed at the last tick
    pub players_waiting: IntGauge,

    /// Time between enqueue and match
    pub queue_wait_time_seconds: Histogram,
}

/// Matchmaking tick and lobby metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Ticks by outcome (matched, no_match, conflict, error)
    pub ticks_total: IntCounterVec,

    /// Wall time of one tick
    pub tick_duration_seconds: Histogram,

    /// Lobbies committed
    pub lobbies_created_total: IntCounter,

    /// Players placed into lobbies
    pub players_matched_total: IntCounter,
}

/// Live connection metrics
#[derive(Clone)]
pub struct ConnectionMetrics {
    /// Currently registered live connections
    pub live_connections: IntGauge,

    /// Notifications by outcome (delivered, offline, failed)
    pub notifications_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let queue_metrics = QueueMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let connection_metrics = ConnectionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            queue_metrics,
            match_metrics,
            connection_metrics,
        })
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matches(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn connections(&self) -> &ConnectionMetrics {
        &self.connection_metrics
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Record a player accepted into the pool
    pub fn record_enqueued(&self) {
        self.queue_metrics.players_enqueued_total.inc();
    }

    /// Record a rejected enqueue request
    pub fn record_enqueue_rejected(&self, reason: &str) {
        self.queue_metrics
            .enqueue_rejected_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record a player leaving the pool
    pub fn record_left(&self) {
        self.queue_metrics.players_left_total.inc();
    }

    /// Update the waiting pool gauge
    pub fn set_players_waiting(&self, count: usize) {
        self.queue_metrics.players_waiting.set(count as i64);
    }

    /// Record a committed lobby and how long each of its players waited
    pub fn record_lobby_created(&self, wait_times_seconds: &[f64]) {
        self.match_metrics.lobbies_created_total.inc();
        self.match_metrics
            .players_matched_total
            .inc_by(wait_times_seconds.len() as u64);

        for wait in wait_times_seconds {
            self.queue_metrics.queue_wait_time_seconds.observe(*wait);
        }
    }

    /// Record one matchmaking tick
    pub fn record_tick(&self, outcome: &str, duration: Duration) {
        self.match_metrics
            .ticks_total
            .with_label_values(&[outcome])
            .inc();
        self.match_metrics
            .tick_duration_seconds
            .observe(duration.as_secs_f64());
    }

    /// Record one notification attempt
    pub fn record_notification(&self, outcome: &str) {
        self.connection_metrics
            .notifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Update the live connection gauge
    pub fn set_live_connections(&self, count: usize) {
        self.connection_metrics.live_connections.set(count as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update uptime
    pub fn set_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("lobby_forge_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "lobby_forge_health_status",
            "Health status (0=unhealthy, 1=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
        })
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let players_enqueued_total = IntCounter::new(
            "lobby_forge_players_enqueued_total",
            "Players accepted into the waiting pool",
        )?;
        registry.register(Box::new(players_enqueued_total.clone()))?;

        let players_left_total = IntCounter::new(
            "lobby_forge_players_left_total",
            "Players that left the waiting pool",
        )?;
        registry.register(Box::new(players_left_total.clone()))?;

        let enqueue_rejected_total = IntCounterVec::new(
            Opts::new(
                "lobby_forge_enqueue_rejected_total",
                "Rejected enqueue requests",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(enqueue_rejected_total.clone()))?;

        let players_waiting = IntGauge::new(
            "lobby_forge_players_waiting",
            "Players in the waiting pool at the last tick",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let queue_wait_time_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "lobby_forge_queue_wait_time_seconds",
                "Time from enqueue to match",
            )
            .buckets(vec![1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        )?;
        registry.register(Box::new(queue_wait_time_seconds.clone()))?;

        Ok(Self {
            players_enqueued_total,
            players_left_total,
            enqueue_rejected_total,
            players_waiting,
            queue_wait_time_seconds,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounterVec::new(
            Opts::new("lobby_forge_ticks_total", "Matchmaking ticks by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(ticks_total.clone()))?;

        let tick_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "lobby_forge_tick_duration_seconds",
                "Matchmaking tick duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(tick_duration_seconds.clone()))?;

        let lobbies_created_total = IntCounter::new(
            "lobby_forge_lobbies_created_total",
            "Lobbies committed",
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let players_matched_total = IntCounter::new(
            "lobby_forge_players_matched_total",
            "Players placed into lobbies",
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        Ok(Self {
            ticks_total,
            tick_duration_seconds,
            lobbies_created_total,
            players_matched_total,
        })
    }
}

impl ConnectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let live_connections = IntGauge::new(
            "lobby_forge_live_connections",
            "Registered live player connections",
        )?;
        registry.register(Box::new(live_connections.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new(
                "lobby_forge_notifications_total",
                "Lobby notifications by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        Ok(Self {
            live_connections,
            notifications_total,
        })
    }
}
