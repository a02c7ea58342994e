//! Main entry point for the lobby-forge matchmaking service
//!
//! Loads configuration, initializes logging, connects the store and runs the
//! matchmaking loop and HTTP server until SIGINT or SIGTERM.

use anyhow::Result;
use clap::Parser;
use lobby_forge::config::{AppConfig, StoreBackend};
use lobby_forge::metrics::MetricsCollector;
use lobby_forge::service::AppState;
use lobby_forge::store::WaitingPool;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Lobby Forge - skill-based lobby matchmaking
#[derive(Parser)]
#[command(
    name = "lobby-forge",
    version,
    about = "A matchmaking service that groups queued players into skill-balanced lobbies",
    long_about = "Lobby Forge keeps a shared waiting pool of players, periodically selects \
                 groups whose skill ratings fall within a fixed spread, commits each group as a \
                 lobby atomically and notifies the members over their WebSocket connections."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Check store connectivity and exit with status code")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Store backend override
    #[arg(long, value_name = "BACKEND", help = "Override store backend (memory, redis)")]
    store: Option<StoreBackend>,

    /// Redis URL override
    #[arg(long, value_name = "URL", help = "Override Redis connection URL")]
    redis_url: Option<String>,

    /// HTTP port override
    #[arg(long, value_name = "PORT", help = "Override HTTP server port")]
    http_port: Option<u16>,

    /// Lobby size override
    #[arg(long, value_name = "N", help = "Override number of players per lobby")]
    lobby_size: Option<usize>,

    /// Skill spread override
    #[arg(
        long,
        value_name = "RATING",
        help = "Override maximum skill spread within a lobby"
    )]
    max_skill_spread: Option<i64>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Check the configured store and exit with the result
async fn perform_health_check(config: AppConfig) -> Result<()> {
    info!("Performing health check...");

    let app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Health check failed: {}", e);
            std::process::exit(1);
        }
    };

    match app_state.store().health_check().await {
        Ok(()) => {
            let waiting = app_state.store().read_all().await.map(|pool| pool.len());
            println!("Health Check: healthy");
            match waiting {
                Ok(count) => println!("  Players Waiting: {}", count),
                Err(e) => println!("  Players Waiting: unavailable ({})", e),
            }
            std::process::exit(0);
        }
        Err(e) => {
            println!("Health Check: unhealthy");
            error!("Store health check failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

/// Periodically log service statistics until shutdown
async fn stats_task(metrics: Arc<MetricsCollector>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                info!(
                    "Stats: {} waiting, {} connected, {} lobbies created",
                    metrics.queue().players_waiting.get(),
                    metrics.connections().live_connections.get(),
                    metrics.matches().lobbies_created_total.get()
                );
            }
        }
    }
}

/// Display startup banner with service information
fn display_startup_banner(config: &AppConfig) {
    info!("🚀 Lobby Forge Matchmaking Service");
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   HTTP: {}:{}",
        config.service.http_host, config.service.http_port
    );
    info!("   Store: {}", config.store.backend);
    info!("   Lobby size: {}", config.matchmaking.lobby_size);
    info!("   Max skill spread: {}", config.matchmaking.max_skill_spread);
    info!("   Tick interval: {}ms", config.matchmaking.tick_interval_ms);
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}

/// Load and merge configuration from environment and CLI arguments
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::from_sources(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(store) = args.store {
        config.store.backend = store;
    }

    if let Some(redis_url) = &args.redis_url {
        config.store.redis_url = redis_url.clone();
    }

    if let Some(http_port) = args.http_port {
        config.service.http_port = http_port;
    }

    if let Some(lobby_size) = args.lobby_size {
        config.matchmaking.lobby_size = lobby_size;
    }

    if let Some(spread) = args.max_skill_spread {
        config.matchmaking.max_skill_spread = spread;
    }

    // Validated once, after every layer has been applied
    lobby_forge::config::validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI args override environment/config file
    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Some(config_path) = &args.config {
        info!("Loaded configuration from: {}", config_path.display());
    }

    if args.health_check {
        return perform_health_check(config).await;
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    info!("Initializing service components...");
    let mut app_state = match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting service...");
    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    let stats = tokio::spawn(stats_task(
        app_state.metrics(),
        app_state.shutdown_token(),
    ));

    info!("✅ Lobby Forge Matchmaking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("🛑 Shutdown signal received, beginning graceful shutdown...");

    match app_state.shutdown().await {
        Ok(()) => info!("✅ Graceful shutdown completed successfully"),
        Err(e) => warn!("⚠️  Shutdown completed with errors: {}", e),
    }

    if let Err(e) = stats.await {
        warn!("Stats task ended abnormally: {}", e);
    }

    info!("🛑 Lobby Forge Matchmaking Service stopped");
    Ok(())
}
