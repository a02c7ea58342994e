//! Main application state and service coordination
//!
//! This module contains the AppState that wires the store, connection
//! registry, matchmaking loop and HTTP server together and owns their
//! lifecycle.

use crate::api::{ApiServer, ApiState};
use crate::config::{validate_config, AppConfig, StoreBackend};
use crate::connection::ConnectionRegistry;
use crate::matchmaking::{LoopHandle, LoopState, MatchCommitter, MatchingRules, MatchmakingLoop};
use crate::metrics::MetricsCollector;
use crate::store::{InMemoryStore, MatchStore, RedisStore, RedisStoreConfig, TimeoutStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Store connection error: {message}")]
    StoreConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Waiting pool and lobby records, with the operation timeout applied
    store: Arc<dyn MatchStore>,

    /// Live player connections
    registry: Arc<ConnectionRegistry>,

    metrics: Arc<MetricsCollector>,

    committer: Arc<MatchCommitter>,

    /// Cancelled on shutdown; stops the loop and drains the HTTP server
    shutdown: CancellationToken,

    loop_handle: Option<LoopHandle>,

    server_task: Option<JoinHandle<anyhow::Result<()>>>,

    local_addr: Option<SocketAddr>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application, connecting to the configured store
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing lobby-forge matchmaking service");
        info!(
            "Configuration: service={}, store={}",
            config.service.name, config.store.backend
        );

        validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let store = Self::initialize_store(&config).await?;
        Self::with_store(config, store)
    }

    /// Initialize around an already constructed store
    pub fn with_store(config: AppConfig, store: Arc<dyn MatchStore>) -> Result<Self, ServiceError> {
        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let store: Arc<dyn MatchStore> = Arc::new(TimeoutStore::new(store, config.store_timeout()));
        let registry = Arc::new(
            ConnectionRegistry::new(config.notify_timeout()).with_metrics(metrics.clone()),
        );
        let committer = Arc::new(MatchCommitter::new(
            store.clone(),
            registry.clone(),
            MatchingRules::from(&config.matchmaking),
            metrics.clone(),
        ));

        Ok(Self {
            config,
            store,
            registry,
            metrics,
            committer,
            shutdown: CancellationToken::new(),
            loop_handle: None,
            server_task: None,
            local_addr: None,
            started_at: Instant::now(),
        })
    }

    async fn initialize_store(config: &AppConfig) -> Result<Arc<dyn MatchStore>, ServiceError> {
        match config.store.backend {
            StoreBackend::Memory => {
                warn!("Using in-memory store; queue and lobbies are lost on restart");
                Ok(Arc::new(InMemoryStore::new()))
            }
            StoreBackend::Redis => {
                info!("Connecting to Redis store...");
                let store = RedisStore::connect(RedisStoreConfig::from(&config.store))
                    .await
                    .map_err(|e| ServiceError::StoreConnection {
                        message: e.to_string(),
                    })?;
                Ok(Arc::new(store))
            }
        }
    }

    /// Start the matchmaking loop and the HTTP server
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.loop_handle.is_some() {
            return Err(ServiceError::Initialization {
                message: "Service already started".to_string(),
            });
        }

        info!("Starting lobby-forge matchmaking service");

        // Bind before anything runs so a taken port leaves nothing behind
        let server = ApiServer::bind(&self.config.service.http_host, self.config.service.http_port)
            .await
            .map_err(|e| ServiceError::Initialization {
                message: format!("{:#}", e),
            })?;
        let local_addr = server.local_addr().map_err(|e| ServiceError::Initialization {
            message: e.to_string(),
        })?;

        let loop_handle = MatchmakingLoop::new(
            self.committer.clone(),
            self.config.tick_interval(),
            self.metrics.clone(),
        )
        .spawn(self.shutdown.child_token());

        let api_state = ApiState {
            store: self.store.clone(),
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            loop_state: loop_handle.subscribe(),
            service_name: self.config.service.name.clone(),
            started_at: self.started_at,
        };
        self.loop_handle = Some(loop_handle);
        self.local_addr = Some(local_addr);
        self.server_task = Some(tokio::spawn(
            server.serve(api_state, self.shutdown.child_token()),
        ));

        info!("Lobby-forge matchmaking service started");
        Ok(())
    }

    /// Stop accepting work, let the in-flight tick finish and drain requests
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of lobby-forge service");
        self.shutdown.cancel();

        let timeout = self.config.shutdown_timeout();
        let mut failures = Vec::new();

        if let Some(server_task) = self.server_task.take() {
            match tokio::time::timeout(timeout, server_task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => failures.push(format!("HTTP server: {}", e)),
                Ok(Err(e)) => failures.push(format!("HTTP server task: {}", e)),
                Err(_) => failures.push("HTTP server did not drain in time".to_string()),
            }
        }

        if let Some(loop_handle) = self.loop_handle.take() {
            match tokio::time::timeout(timeout, loop_handle.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => failures.push(format!("Matchmaking loop: {}", e)),
                Err(_) => failures.push("Matchmaking loop did not stop in time".to_string()),
            }
        }

        info!(
            "Final statistics: lobbies created={}, players matched={}",
            self.metrics.matches().lobbies_created_total.get(),
            self.metrics.matches().players_matched_total.get()
        );

        if failures.is_empty() {
            info!("Lobby-forge service shutdown completed");
            Ok(())
        } else {
            for failure in &failures {
                error!("Shutdown problem: {}", failure);
            }
            Err(ServiceError::BackgroundTask {
                message: failures.join("; "),
            })
        }
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// True while the matchmaking loop is running
    pub fn is_running(&self) -> bool {
        self.loop_handle
            .as_ref()
            .map(|handle| handle.state() == LoopState::Running)
            .unwrap_or(false)
    }

    pub fn store(&self) -> Arc<dyn MatchStore> {
        self.store.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn committer(&self) -> Arc<MatchCommitter> {
        self.committer.clone()
    }

    /// Address the HTTP server is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Token that triggers shutdown when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}
