use std::collections::BTreeMap;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;
use tracing::info;

use super::PlatformError;

/// String key-value persistence. `set` overwrites; nothing merges.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError>;

    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError>;

    /// Returns `(key, value)` pairs whose key matches a `prefix*` pattern.
    async fn list(&self, pattern: &str) -> Result<Vec<(String, String)>, PlatformError>;

    /// Removes every key. Only the bulk wipe calls this.
    async fn flush(&self) -> Result<(), PlatformError>;
}

/// Redis backed store over a single multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub async fn connect(client: &redis::Client) -> Result<Self, PlatformError> {
        let conn = client.get_multiplexed_async_connection().await?;
        info!("Redis connection established");
        Ok(Self { conn })
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn list(&self, pattern: &str) -> Result<Vec<(String, String)>, PlatformError> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = conn.keys(pattern).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort();

        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        // A key can expire or be deleted between KEYS and MGET.
        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }

    async fn flush(&self) -> Result<(), PlatformError> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

/// In-process store for local development (`KV_BACKEND=memory`) and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, PlatformError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn list(&self, pattern: &str) -> Result<Vec<(String, String)>, PlatformError> {
        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(k, _)| matches_pattern(pattern, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn flush(&self) -> Result<(), PlatformError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Supports the `prefix*` form used by callers, plus exact keys.
fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}
