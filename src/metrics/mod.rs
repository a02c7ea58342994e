//! Metrics for the lobby-forge matchmaking service
//!
//! Prometheus counters, gauges and histograms covering the waiting pool, the
//! matchmaking loop and live connections. Served at `GET /metrics`.

pub mod collector;

pub use collector::{
    ConnectionMetrics, MatchMetrics, MetricsCollector, MetricsTimer, QueueMetrics, ServiceMetrics,
};
