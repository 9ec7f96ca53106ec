//! Caching layer.
//!
//! A unified `CacheStore` interface with two backends:
//! - `InMemoryCacheStore`: RwLock-guarded map with TTL (tests/single-node)
//! - `RedisCacheStore`: Redis-backed cache for production
//!
//! The cache is an accelerator, never authoritative: every consumer maps
//! a cache error to a miss and keeps going. Key recipes and TTLs live in
//! [`keys`] so namespaces stay consistent across the codebase.
//!
//! | Namespace | TTL | Invalidated by |
//! |-----------|-----|----------------|
//! | `rec:{user}:{hash}` | 5 min | any bookmark write for the user |
//! | `intent:{hash}` | 1 h | project update |
//! | `bookmarks:{user}` | 10 min | any bookmark write for the user |
//! | `analysis:{content}` | 1 day | analysis write, re-scrape |
//! | `prefs:{user}` | 1 week | feedback writes |
//! | `progress:{user}:{job}` | job + 10 min | job completion |
//! | `ratelimit:{user}` | window lifetime | — |

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::common::errors::{AppError, AppResult};

/// Cache key recipes and TTLs.
pub mod keys {
    use std::time::Duration;
    use uuid::Uuid;

    pub const TTL_RECOMMENDATIONS: Duration = Duration::from_secs(5 * 60);
    pub const TTL_INTENT: Duration = Duration::from_secs(60 * 60);
    pub const TTL_BOOKMARK_LIST: Duration = Duration::from_secs(10 * 60);
    pub const TTL_ANALYSIS: Duration = Duration::from_secs(24 * 60 * 60);
    pub const TTL_PREFERENCES: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    /// Added on top of the expected job duration
    pub const TTL_PROGRESS_TAIL: Duration = Duration::from_secs(10 * 60);
    /// Lease held by a worker analyzing one bookmark
    pub const TTL_ANALYSIS_CLAIM: Duration = Duration::from_secs(5 * 60);

    /// Cached recommendation result for one normalized request.
    pub fn recommendations(user: Uuid, request_hash: &str) -> String {
        format!("rec:{}:{}", user, request_hash)
    }

    /// Pattern invalidating every cached recommendation for a user.
    pub fn recommendations_pattern(user: Uuid) -> String {
        format!("rec:{}:*", user)
    }

    /// Cached intent for a context fingerprint.
    pub fn intent(context_hash: &str) -> String {
        format!("intent:{}", context_hash)
    }

    /// Cached bookmark list for a user.
    pub fn bookmark_list(user: Uuid) -> String {
        format!("bookmarks:{}", user)
    }

    /// Cached content analysis.
    pub fn analysis(content: Uuid) -> String {
        format!("analysis:{}", content)
    }

    /// Cached preference profile.
    pub fn preferences(user: Uuid) -> String {
        format!("prefs:{}", user)
    }

    /// Event log for a job's progress stream.
    pub fn progress(user: Uuid, job: Uuid) -> String {
        format!("progress:{}:{}", user, job)
    }

    /// Cancellation flag for a job.
    pub fn job_cancel(user: Uuid, job: Uuid) -> String {
        format!("progress:{}:{}:cancel", user, job)
    }

    /// Mirrored rate-limit counters for a user.
    pub fn ratelimit(user: Uuid) -> String {
        format!("ratelimit:{}", user)
    }

    /// Worker lease over one bookmark's analysis.
    pub fn analysis_claim(content: Uuid) -> String {
        format!("analysis_claim:{}", content)
    }
}

// ============================================================================
// Cache Store Trait
// ============================================================================

/// Abstract cache interface. Implementations handle TTL expiry, support
/// prefix-pattern invalidation, and are thread-safe.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a value. `None` when absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>>;

    /// Set a value with optional TTL (`None` = no expiry).
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()>;

    /// Delete a key. Returns whether it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Delete all keys matching a glob pattern (`prefix:*`).
    /// Returns the number deleted.
    async fn delete_pattern(&self, pattern: &str) -> AppResult<usize>;

    /// Atomically add `delta` to an integer key (missing counts as 0).
    /// Returns the new value.
    async fn incr(&self, key: &str, delta: i64) -> AppResult<i64>;

    /// Set only if the key is absent. Returns whether the write happened.
    async fn set_if_absent(&self, key: &str, value: &[u8], ttl: Option<Duration>)
        -> AppResult<bool>;
}

/// Get and deserialize a JSON value; cache errors and decode failures
/// both come back as misses (with a warning for the former).
pub async fn cache_get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
        Ok(None) => None,
        Err(e) => {
            warn!(key = %key, error = %e, "cache read failed, treating as miss");
            None
        }
    }
}

/// Serialize and store a JSON value; failures are logged and swallowed.
pub async fn cache_set_json<T: Serialize>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) {
    let bytes = match serde_json::to_vec(value) {
        Ok(b) => b,
        Err(e) => {
            warn!(key = %key, error = %e, "cache serialization failed");
            return;
        }
    };
    if let Err(e) = cache.set(key, &bytes, ttl).await {
        warn!(key = %key, error = %e, "cache write failed");
    }
}

// ============================================================================
// In-Memory Cache Store
// ============================================================================

struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Option<Duration>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.ttl
            .map(|ttl| self.created_at.elapsed() > ttl)
            .unwrap_or(false)
    }
}

/// In-memory cache with TTL expiry on access and glob-prefix invalidation.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.values().filter(|e| !e.is_expired()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn pattern_matches(pattern: &str, key: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return key.starts_with(prefix);
        }
        pattern == key
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.is_expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                data: value.to_vec(),
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        Ok(entries.remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !Self::pattern_matches(pattern, key));
        Ok(before - entries.len())
    }

    async fn incr(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut entries = self.entries.write().await;
        let current = match entries.get(key) {
            Some(entry) if !entry.is_expired() => std::str::from_utf8(&entry.data)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(0),
            _ => 0,
        };
        let next = current + delta;
        let ttl = entries.get(key).and_then(|e| e.ttl);
        entries.insert(
            key.to_string(),
            CacheEntry {
                data: next.to_string().into_bytes(),
                created_at: Instant::now(),
                ttl,
            },
        );
        Ok(next)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(false),
            _ => {
                entries.insert(
                    key.to_string(),
                    CacheEntry {
                        data: value.to_vec(),
                        created_at: Instant::now(),
                        ttl,
                    },
                );
                Ok(true)
            }
        }
    }
}

// ============================================================================
// Redis Cache Store
// ============================================================================

/// Redis-backed cache over a multiplexed connection manager.
///
/// The manager reconnects on its own; individual command failures map to
/// [`AppError::CacheUnavailable`], which consumers downgrade to misses.
pub struct RedisCacheStore {
    conn: redis::aio::ConnectionManager,
}

impl RedisCacheStore {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::CacheUnavailable(format!("bad redis url: {}", e)))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::CacheUnavailable(format!("redis connect failed: {}", e)))?;
        Ok(Self { conn })
    }

    fn map_err(e: redis::RedisError) -> AppError {
        AppError::CacheUnavailable(e.to_string())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let _: () = cmd.query_async(&mut conn).await.map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(deleted > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> AppResult<usize> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut deleted: usize = 0;

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

            if !batch.is_empty() {
                let n: i64 = redis::cmd("DEL")
                    .arg(&batch)
                    .query_async(&mut conn)
                    .await
                    .map_err(Self::map_err)?;
                deleted += n as usize;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(deleted)
    }

    async fn incr(&self, key: &str, delta: i64) -> AppResult<i64> {
        let mut conn = self.conn.clone();
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(value)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl.as_millis() as u64);
        }
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(Self::map_err)?;
        Ok(reply.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_get_roundtrip() {
        let cache = InMemoryCacheStore::new();
        cache.set("k", b"v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn expired_entries_read_as_misses() {
        let cache = InMemoryCacheStore::new();
        cache
            .set("k", b"v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_pattern_removes_prefix_matches() {
        let cache = InMemoryCacheStore::new();
        let user = uuid::Uuid::new_v4();
        cache
            .set(&keys::recommendations(user, "h1"), b"1", None)
            .await
            .unwrap();
        cache
            .set(&keys::recommendations(user, "h2"), b"2", None)
            .await
            .unwrap();
        cache.set("other:key", b"3", None).await.unwrap();

        let deleted = cache
            .delete_pattern(&keys::recommendations_pattern(user))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert!(cache.get("other:key").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn incr_starts_at_zero() {
        let cache = InMemoryCacheStore::new();
        assert_eq!(cache.incr("counter", 1).await.unwrap(), 1);
        assert_eq!(cache.incr("counter", 2).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn set_if_absent_wins_only_once() {
        let cache = InMemoryCacheStore::new();
        assert!(cache.set_if_absent("lease", b"w1", None).await.unwrap());
        assert!(!cache.set_if_absent("lease", b"w2", None).await.unwrap());
        assert_eq!(cache.get("lease").await.unwrap(), Some(b"w1".to_vec()));
    }

    #[tokio::test]
    async fn set_if_absent_succeeds_after_expiry() {
        let cache = InMemoryCacheStore::new();
        cache
            .set_if_absent("lease", b"w1", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.set_if_absent("lease", b"w2", None).await.unwrap());
    }

    #[tokio::test]
    async fn json_helpers_swallow_decode_failures() {
        let cache = InMemoryCacheStore::new();
        cache.set("bad", b"not-json{", None).await.unwrap();
        let decoded: Option<serde_json::Value> = cache_get_json(&cache, "bad").await;
        assert!(decoded.is_none());
    }

    #[test]
    fn key_recipes_are_stable() {
        let user = uuid::Uuid::nil();
        assert_eq!(
            keys::recommendations(user, "abc"),
            "rec:00000000-0000-0000-0000-000000000000:abc"
        );
        assert!(keys::recommendations_pattern(user).ends_with(":*"));
        assert_eq!(keys::intent("h"), "intent:h");
    }
}
