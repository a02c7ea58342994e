//! Redis-backed store
//!
//! Layout: a list holding the queue order, one JSON string per queued player
//! under `<player prefix><id>`, and one JSON string per lobby under
//! `<lobby prefix><id>`. Every operation that touches more than one key runs as
//! a Lua script, which Redis executes as a single atomic step.

use crate::config::StoreSettings;
use crate::error::{MatchmakingError, Result};
use crate::store::{CommitOutcome, LobbyStore, WaitingPool};
use crate::types::{Lobby, PlayerEntry, PlayerId};
use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError, Script};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// KEYS[1] queue, ARGV[1] player prefix
const READ_ALL_SCRIPT: &str = r#"
local ids = redis.call('LRANGE', KEYS[1], 0, -1)
local docs = {}
for _, id in ipairs(ids) do
    local doc = redis.call('GET', ARGV[1] .. id)
    if doc then
        table.insert(docs, doc)
    end
end
return docs
"#;

/// KEYS[1] queue, KEYS[2] player key, ARGV[1] player id, ARGV[2] document
const ENQUEUE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return 0
end
redis.call('SET', KEYS[2], ARGV[2])
redis.call('RPUSH', KEYS[1], ARGV[1])
return 1
"#;

/// KEYS[1] queue, ARGV[1] player prefix, ARGV[2..] player ids
const REMOVE_ALL_SCRIPT: &str = r#"
local removed = 0
for i = 2, #ARGV do
    redis.call('LREM', KEYS[1], 0, ARGV[i])
    removed = removed + redis.call('DEL', ARGV[1] .. ARGV[i])
end
return removed
"#;

/// KEYS[1] queue, KEYS[2] lobby key, ARGV[1] player prefix,
/// ARGV[2] lobby document, ARGV[3..] player ids
const COMMIT_LOBBY_SCRIPT: &str = r#"
local missing = {}
for i = 3, #ARGV do
    if redis.call('EXISTS', ARGV[1] .. ARGV[i]) == 0 then
        table.insert(missing, ARGV[i])
    end
end
if #missing > 0 then
    return missing
end
for i = 3, #ARGV do
    redis.call('LREM', KEYS[1], 0, ARGV[i])
    redis.call('DEL', ARGV[1] .. ARGV[i])
end
redis.call('SET', KEYS[2], ARGV[2])
return missing
"#;

/// Connection and key layout for [`RedisStore`]
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    pub url: String,
    pub queue_key: String,
    pub player_key_prefix: String,
    pub lobby_key_prefix: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self::from(&StoreSettings::default())
    }
}

impl From<&StoreSettings> for RedisStoreConfig {
    fn from(settings: &StoreSettings) -> Self {
        Self {
            url: settings.redis_url.clone(),
            queue_key: settings.queue_key.clone(),
            player_key_prefix: settings.player_key_prefix.clone(),
            lobby_key_prefix: settings.lobby_key_prefix.clone(),
            max_retries: settings.connect_max_retries,
            retry_delay_ms: settings.connect_retry_delay_ms,
        }
    }
}

impl RedisStoreConfig {
    fn player_key(&self, player_id: &str) -> String {
        format!("{}{}", self.player_key_prefix, player_id)
    }

    fn lobby_key(&self, lobby_id: &str) -> String {
        format!("{}{}", self.lobby_key_prefix, lobby_id)
    }
}

/// Map a redis client error into the store failure class
fn store_failure(operation: &str, error: RedisError) -> anyhow::Error {
    MatchmakingError::StoreFailed {
        message: format!("{} failed: {}", operation, error),
    }
    .into()
}

fn decode_failure(operation: &str, error: serde_json::Error) -> anyhow::Error {
    MatchmakingError::StoreFailed {
        message: format!("{} returned a malformed document: {}", operation, error),
    }
    .into()
}

/// Waiting pool and lobby store backed by a shared Redis connection
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
    read_all_script: Script,
    enqueue_script: Script,
    remove_all_script: Script,
    commit_lobby_script: Script,
}

impl RedisStore {
    /// Connect with exponential backoff. Giving up after the configured
    /// retries is reported as an error the caller treats as fatal.
    pub async fn connect(config: RedisStoreConfig) -> Result<Self> {
        let connection = Self::connect_with_retry(&config).await?;

        Ok(Self {
            connection,
            config,
            read_all_script: Script::new(READ_ALL_SCRIPT),
            enqueue_script: Script::new(ENQUEUE_SCRIPT),
            remove_all_script: Script::new(REMOVE_ALL_SCRIPT),
            commit_lobby_script: Script::new(COMMIT_LOBBY_SCRIPT),
        })
    }

    async fn connect_with_retry(config: &RedisStoreConfig) -> Result<ConnectionManager> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(config.retry_delay_ms);

        loop {
            match Self::try_connect(&config.url).await {
                Ok(connection) => {
                    info!("Connected to Redis store");
                    return Ok(connection);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > config.max_retries {
                        error!(
                            "Failed to connect to Redis after {} retries",
                            config.max_retries
                        );
                        return Err(MatchmakingError::StoreFailed {
                            message: format!("Max connection retries exceeded: {}", e),
                        }
                        .into());
                    }

                    warn!(
                        "Redis connection attempt {} failed: {}. Retrying in {:?}",
                        retry_count, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(30_000));
                }
            }
        }
    }

    async fn try_connect(url: &str) -> Result<ConnectionManager> {
        let client = Client::open(url).map_err(|e| store_failure("open client", e))?;
        let mut connection = ConnectionManager::new(client)
            .await
            .map_err(|e| store_failure("connect", e))?;

        let _: String = ::redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| store_failure("ping", e))?;

        Ok(connection)
    }
}

#[async_trait]
impl WaitingPool for RedisStore {
    async fn enqueue(&self, entry: PlayerEntry) -> Result<()> {
        let document = serde_json::to_string(&entry).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to encode player entry: {}", e),
            }
        })?;

        let mut connection = self.connection.clone();
        let inserted: i64 = self
            .enqueue_script
            .key(&self.config.queue_key)
            .key(self.config.player_key(&entry.player_id))
            .arg(&entry.player_id)
            .arg(document)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| store_failure("enqueue", e))?;

        if inserted == 0 {
            return Err(MatchmakingError::AlreadyQueued {
                player_id: entry.player_id,
            }
            .into());
        }

        debug!(player_id = %entry.player_id, "Player stored in Redis pool");
        Ok(())
    }

    async fn remove_all(&self, player_ids: &[PlayerId]) -> Result<usize> {
        if player_ids.is_empty() {
            return Ok(0);
        }

        let mut invocation = self.remove_all_script.prepare_invoke();
        invocation
            .key(&self.config.queue_key)
            .arg(&self.config.player_key_prefix);
        for player_id in player_ids {
            invocation.arg(player_id);
        }

        let mut connection = self.connection.clone();
        let removed: i64 = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(|e| store_failure("remove_all", e))?;

        Ok(removed.max(0) as usize)
    }

    async fn read_all(&self) -> Result<Vec<PlayerEntry>> {
        let mut connection = self.connection.clone();
        let documents: Vec<String> = self
            .read_all_script
            .key(&self.config.queue_key)
            .arg(&self.config.player_key_prefix)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| store_failure("read_all", e))?;

        documents
            .iter()
            .map(|doc| serde_json::from_str(doc).map_err(|e| decode_failure("read_all", e)))
            .collect()
    }

    async fn health_check(&self) -> Result<()> {
        let mut connection = self.connection.clone();
        let _: String = ::redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| store_failure("ping", e))?;
        Ok(())
    }
}

#[async_trait]
impl LobbyStore for RedisStore {
    async fn commit_lobby(&self, lobby: &Lobby) -> Result<CommitOutcome> {
        let document = serde_json::to_string(lobby).map_err(|e| {
            MatchmakingError::InternalError {
                message: format!("Failed to encode lobby: {}", e),
            }
        })?;

        let mut invocation = self.commit_lobby_script.prepare_invoke();
        invocation
            .key(&self.config.queue_key)
            .key(self.config.lobby_key(&lobby.lobby_id))
            .arg(&self.config.player_key_prefix)
            .arg(document);
        for player_id in &lobby.player_ids {
            invocation.arg(player_id);
        }

        let mut connection = self.connection.clone();
        let missing: Vec<String> = invocation
            .invoke_async(&mut connection)
            .await
            .map_err(|e| store_failure("commit_lobby", e))?;

        if missing.is_empty() {
            Ok(CommitOutcome::Committed)
        } else {
            Ok(CommitOutcome::Conflict { missing })
        }
    }

    async fn get_lobby(&self, lobby_id: &str) -> Result<Option<Lobby>> {
        let mut connection = self.connection.clone();
        let document: Option<String> = ::redis::cmd("GET")
            .arg(self.config.lobby_key(lobby_id))
            .query_async(&mut connection)
            .await
            .map_err(|e| store_failure("get_lobby", e))?;

        document
            .map(|doc| serde_json::from_str(&doc).map_err(|e| decode_failure("get_lobby", e)))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let mut settings = StoreSettings::default();
        settings.redis_url = "redis://cache:6379/3".to_string();
        settings.connect_max_retries = 2;

        let config = RedisStoreConfig::from(&settings);
        assert_eq!(config.url, "redis://cache:6379/3");
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.player_key("p1"), "player:p1");
        assert_eq!(config.lobby_key("abc"), "lobby:abc");
    }

    // The tests below need a live server:
    // REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored

    use crate::utils::{current_timestamp, generate_lobby_id};

    /// Store under a fresh key namespace so runs never see each other's data
    async fn live_store() -> RedisStore {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let namespace = uuid::Uuid::new_v4();
        RedisStore::connect(RedisStoreConfig {
            url,
            queue_key: format!("test:{}:queue", namespace),
            player_key_prefix: format!("test:{}:player:", namespace),
            lobby_key_prefix: format!("test:{}:lobby:", namespace),
            max_retries: 0,
            retry_delay_ms: 10,
        })
        .await
        .unwrap()
    }

    fn entry(player_id: &str, skill_rating: i64) -> PlayerEntry {
        PlayerEntry {
            player_id: player_id.to_string(),
            skill_rating,
            enqueued_at: current_timestamp(),
        }
    }

    async fn seed(store: &RedisStore, ratings: &[i64]) -> Vec<PlayerEntry> {
        let mut entries = Vec::new();
        for (i, rating) in ratings.iter().enumerate() {
            let player = entry(&format!("p{}", i), *rating);
            store.enqueue(player.clone()).await.unwrap();
            entries.push(player);
        }
        entries
    }

    #[tokio::test]
    #[ignore]
    async fn test_read_all_preserves_queue_order() {
        let store = live_store().await;
        let entries = seed(&store, &[1600, 1400, 1500]).await;

        let pool = store.read_all().await.unwrap();
        let ids: Vec<_> = pool.iter().map(|p| p.player_id.as_str()).collect();
        assert_eq!(ids, vec!["p0", "p1", "p2"]);
        assert_eq!(pool, entries);
    }

    #[tokio::test]
    #[ignore]
    async fn test_duplicate_enqueue_refused() {
        let store = live_store().await;
        store.enqueue(entry("p1", 1500)).await.unwrap();

        let err = store.enqueue(entry("p1", 1700)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::AlreadyQueued { .. })
        ));

        let pool = store.read_all().await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].skill_rating, 1500);
    }

    #[tokio::test]
    #[ignore]
    async fn test_remove_all_is_idempotent() {
        let store = live_store().await;
        seed(&store, &[1400, 1500, 1600]).await;

        let targets = vec!["p0".to_string(), "ghost".to_string()];
        assert_eq!(store.remove_all(&targets).await.unwrap(), 1);
        assert_eq!(store.remove_all(&targets).await.unwrap(), 0);

        let ids: Vec<_> = store
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.player_id)
            .collect();
        assert_eq!(ids, vec!["p1".to_string(), "p2".to_string()]);
    }

    #[tokio::test]
    #[ignore]
    async fn test_commit_lobby_claims_players() {
        let store = live_store().await;
        let entries = seed(&store, &[1400, 1410, 1420, 1430, 1440, 1600]).await;

        let lobby = Lobby::from_group(generate_lobby_id(), &entries[..5], current_timestamp());
        assert_eq!(
            store.commit_lobby(&lobby).await.unwrap(),
            CommitOutcome::Committed
        );

        let pool = store.read_all().await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].player_id, "p5");

        let stored = store.get_lobby(&lobby.lobby_id).await.unwrap();
        assert_eq!(stored, Some(lobby));
    }

    #[tokio::test]
    #[ignore]
    async fn test_commit_lobby_conflict_changes_nothing() {
        let store = live_store().await;
        let entries = seed(&store, &[1400, 1410, 1420, 1430, 1440]).await;
        store.remove_all(&["p2".to_string()]).await.unwrap();

        let lobby = Lobby::from_group(generate_lobby_id(), &entries, current_timestamp());
        assert_eq!(
            store.commit_lobby(&lobby).await.unwrap(),
            CommitOutcome::Conflict {
                missing: vec!["p2".to_string()]
            }
        );

        assert_eq!(store.read_all().await.unwrap().len(), 4);
        assert!(store.get_lobby(&lobby.lobby_id).await.unwrap().is_none());
    }
}
