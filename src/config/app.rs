//! Main application configuration
//!
//! This module defines the primary configuration structures for the lobby-forge
//! matchmaking service: defaults, TOML file loading, environment overrides and
//! validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub store: StoreSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the HTTP server binds to
    pub http_host: String,
    /// Port for the HTTP server (queue, lobbies, websocket, health, metrics).
    /// 0 binds an ephemeral port.
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Which persistence engine backs the waiting pool and lobby records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(anyhow!("Unknown store backend: {}", other)),
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Redis => write!(f, "redis"),
        }
    }
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Redis connection URL
    pub redis_url: String,
    /// List holding the ordered queue of player IDs
    pub queue_key: String,
    /// Prefix for per-player metadata documents
    pub player_key_prefix: String,
    /// Prefix for lobby documents
    pub lobby_key_prefix: String,
    /// Upper bound for any single store operation in milliseconds
    pub operation_timeout_ms: u64,
    /// Maximum retry attempts for the initial connection
    pub connect_max_retries: u32,
    /// Initial retry delay in milliseconds (doubles per attempt)
    pub connect_retry_delay_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Number of players per lobby
    pub lobby_size: usize,
    /// Maximum rating difference between lowest and highest player in a lobby
    pub max_skill_spread: i64,
    /// Delay between matchmaking ticks in milliseconds
    pub tick_interval_ms: u64,
    /// Upper bound for delivering one notification in milliseconds
    pub notify_timeout_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-forge".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            queue_key: "matchmaking_queue".to_string(),
            player_key_prefix: "player:".to_string(),
            lobby_key_prefix: "lobby:".to_string(),
            operation_timeout_ms: 2000,
            connect_max_retries: 5,
            connect_retry_delay_ms: 500,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            lobby_size: 5,
            max_skill_spread: 100,
            tick_interval_ms: 1000,
            notify_timeout_ms: 2000,
        }
    }
}

/// Parse an environment variable if present
fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match env::var(key) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", key, value)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let config = Self::from_sources(None)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let config = Self::from_sources(Some(path))?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Defaults or the TOML file, then environment overrides, without
    /// validation. Callers layering further overrides validate at the end.
    pub fn from_sources(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                toml::from_str(&raw)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HTTP_HOST") {
            self.service.http_host = host;
        }
        if let Some(port) = env_parse("SERVER_PORT")? {
            self.service.http_port = port;
        }
        if let Some(port) = env_parse("HTTP_PORT")? {
            self.service.http_port = port;
        }
        if let Some(timeout) = env_parse("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Store settings
        if let Some(backend) = env_parse("STORE_BACKEND")? {
            self.store.backend = backend;
        }
        if let Ok(addr) = env::var("REDIS_ADDR") {
            let password = env::var("REDIS_PASSWORD").unwrap_or_default();
            let db: i64 = env_parse("REDIS_DB")?.unwrap_or(0);
            self.store.redis_url = redis_url_from_parts(&addr, &password, db);
        }
        if let Ok(url) = env::var("REDIS_URL") {
            self.store.redis_url = url;
        }
        if let Some(timeout) = env_parse("STORE_OPERATION_TIMEOUT_MS")? {
            self.store.operation_timeout_ms = timeout;
        }

        // Matchmaking settings
        if let Some(size) = env_parse("LOBBY_SIZE")? {
            self.matchmaking.lobby_size = size;
        }
        if let Some(spread) = env_parse("MAX_SKILL_SPREAD")? {
            self.matchmaking.max_skill_spread = spread;
        }
        if let Some(interval) = env_parse("TICK_INTERVAL_MS")? {
            self.matchmaking.tick_interval_ms = interval;
        }
        if let Some(timeout) = env_parse("NOTIFY_TIMEOUT_MS")? {
            self.matchmaking.notify_timeout_ms = timeout;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get store operation timeout as Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.operation_timeout_ms)
    }

    /// Get matchmaking tick interval as Duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.matchmaking.tick_interval_ms)
    }

    /// Get notification delivery timeout as Duration
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.matchmaking.notify_timeout_ms)
    }
}

/// Build a redis URL from the address/password/db triple used by older deployments
pub fn redis_url_from_parts(addr: &str, password: &str, db: i64) -> String {
    if password.is_empty() {
        format!("redis://{}/{}", addr, db)
    } else {
        format!(
            "redis://:{}@{}/{}",
            urlencoding::encode(password),
            addr,
            db
        )
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.http_host.is_empty() {
        return Err(anyhow!("HTTP host cannot be empty"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate store settings
    if config.store.backend == StoreBackend::Redis && config.store.redis_url.is_empty() {
        return Err(anyhow!("Redis URL cannot be empty"));
    }
    if config.store.queue_key.is_empty()
        || config.store.player_key_prefix.is_empty()
        || config.store.lobby_key_prefix.is_empty()
    {
        return Err(anyhow!("Store key names cannot be empty"));
    }
    if config.store.operation_timeout_ms == 0 {
        return Err(anyhow!("Store operation timeout must be greater than 0"));
    }

    // Validate matchmaking settings
    if config.matchmaking.lobby_size == 0 {
        return Err(anyhow!("Lobby size must be at least 1"));
    }
    if config.matchmaking.max_skill_spread < 0 {
        return Err(anyhow!("Max skill spread cannot be negative"));
    }
    if config.matchmaking.tick_interval_ms == 0 {
        return Err(anyhow!("Tick interval must be greater than 0"));
    }
    if config.matchmaking.notify_timeout_ms == 0 {
        return Err(anyhow!("Notify timeout must be greater than 0"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.matchmaking.lobby_size, 5);
        assert_eq!(config.matchmaking.max_skill_spread, 100);
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.store.queue_key, "matchmaking_queue");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.matchmaking.lobby_size = 0;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.service.log_level = "loud".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.matchmaking.max_skill_spread = -1;
        assert!(validate_config(&config).is_err());

        let mut config = AppConfig::default();
        config.store.redis_url = String::new();
        assert!(validate_config(&config).is_err());

        // An empty URL is fine when redis is not used
        config.store.backend = StoreBackend::Memory;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [store]
            backend = "memory"

            [matchmaking]
            lobby_size = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.matchmaking.lobby_size, 4);
        assert_eq!(config.matchmaking.max_skill_spread, 100);
        assert_eq!(config.service.http_port, 8080);
    }

    #[test]
    fn test_redis_url_from_parts() {
        assert_eq!(
            redis_url_from_parts("localhost:6379", "", 2),
            "redis://localhost:6379/2"
        );
        assert_eq!(
            redis_url_from_parts("cache:6379", "hunter2", 0),
            "redis://:hunter2@cache:6379/0"
        );
        // Reserved characters must not break the authority part
        assert_eq!(
            redis_url_from_parts("cache:6379", "p@ss/w:rd", 1),
            "redis://:p%40ss%2Fw%3Ard@cache:6379/1"
        );
    }

    #[test]
    fn test_sources_are_not_validated_until_asked() {
        let path = std::env::temp_dir().join(format!("lobby-forge-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "[matchmaking]\nlobby_size = 0\n").unwrap();

        // A later layer may still fix the value, so loading alone succeeds
        let mut config = AppConfig::from_sources(Some(&path)).unwrap();
        assert_eq!(config.matchmaking.lobby_size, 0);
        assert!(AppConfig::from_file(&path).is_err());

        config.matchmaking.lobby_size = 5;
        assert!(validate_config(&config).is_ok());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!("Redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }
}
