//! Key/value cache stores

use crate::error::{InvalidationError, Result};
use crate::target::glob_match;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Pipeline};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Keys fetched per SCAN round trip
const SCAN_COUNT: usize = 100;

/// Minimal cache surface the services need.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    /// All keys matching a glob. Must not block the store.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    /// Delete keys without blocking the store; returns how many existed.
    async fn unlink(&self, keys: &[String]) -> Result<usize>;
}

// ============================================================================
// Redis
// ============================================================================

/// Redis-backed store. SCAN walks the keyspace incrementally and UNLINK
/// frees memory in the background, so bulk eviction never stalls Redis.
#[derive(Clone)]
pub struct RedisCacheStore {
    conn: ConnectionManager,
}

impl RedisCacheStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await?;
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut found = Vec::new();

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;

            found.extend(keys);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        // SCAN may return a key more than once
        found.sort_unstable();
        found.dedup();
        debug!(pattern = %pattern, matched = found.len(), "Cache scan");
        Ok(found)
    }

    async fn unlink(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let mut pipe = Pipeline::new();
        for chunk in keys.chunks(SCAN_COUNT) {
            pipe.cmd("UNLINK").arg(chunk);
        }
        let removed: Vec<usize> = pipe.query_async(&mut conn).await?;
        Ok(removed.into_iter().sum())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// Process-local store with the same glob semantics, for tests and local
/// development. Can be switched "offline" to simulate a Redis outage.
#[derive(Clone, Default)]
pub struct InMemoryCacheStore {
    entries: Arc<DashMap<String, (String, Instant)>>,
    offline: Arc<AtomicBool>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every operation fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.live_value(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().1 > now)
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        keys
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(InvalidationError::Unavailable(
                "in-memory store is offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn live_value(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        let (value, expires_at) = entry.value();
        if *expires_at > Instant::now() {
            Some(value.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        Ok(self.live_value(key))
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        self.check_online()?;
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs);
        self.entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self
            .keys()
            .into_iter()
            .filter(|key| glob_match(pattern, key))
            .collect())
    }

    async fn unlink(&self, keys: &[String]) -> Result<usize> {
        self.check_online()?;
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let store = InMemoryCacheStore::new();
        store.set_ex("post:1", "{}".to_string(), 60).await.unwrap();

        assert_eq!(store.get("post:1").await.unwrap().as_deref(), Some("{}"));
        assert_eq!(store.get("post:2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entry_is_invisible() {
        let store = InMemoryCacheStore::new();
        store.set_ex("post:1", "{}".to_string(), 0).await.unwrap();

        assert_eq!(store.get("post:1").await.unwrap(), None);
        assert!(store.scan("post:*").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_and_unlink() {
        let store = InMemoryCacheStore::new();
        for key in ["posts:cursor:start:20", "posts:cursor:abc:20", "post:1"] {
            store.set_ex(key, "v".to_string(), 60).await.unwrap();
        }

        let matched = store.scan("posts:*").await.unwrap();
        assert_eq!(matched.len(), 2);

        let removed = store.unlink(&matched).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.keys(), vec!["post:1".to_string()]);
    }

    #[tokio::test]
    async fn test_offline_store_fails() {
        let store = InMemoryCacheStore::new();
        store.set_offline(true);

        let err = store.get("post:1").await.unwrap_err();
        assert!(matches!(err, InvalidationError::Unavailable(_)));
    }
}
