//! In-process cache backend.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{CacheBackend, CacheResult, CacheStore, KeyPattern, TRACING_TARGET_CACHE};

/// Fallback lifetime when `now + ttl` overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Stored value together with its absolute expiration.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: serde_json::Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(value: serde_json::Value, ttl: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);

        Self { value, expires_at }
    }

    /// Returns the stored value.
    #[inline]
    pub fn value(&self) -> &serde_json::Value {
        &self.value
    }

    /// Returns the instant at which the entry stops being served.
    #[inline]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// An entry is expired once `now` reaches its expiration.
    #[inline]
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache backed by a shared in-process map.
///
/// Expired entries are never returned. They are dropped lazily on read and
/// periodically by the task started with [`MemoryCache::spawn_sweeper`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes every expired entry and returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Starts a background task sweeping expired entries every `interval`.
    ///
    /// The task holds a weak reference and stops once the cache is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let entries: Weak<RwLock<HashMap<String, CacheEntry>>> = Arc::downgrade(&self.entries);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(entries) = entries.upgrade() else {
                    tracing::debug!(
                        target: TRACING_TARGET_CACHE,
                        "cache dropped, stopping sweeper"
                    );
                    break;
                };

                let removed = Self { entries }.sweep_expired().await;
                if removed > 0 {
                    tracing::debug!(
                        target: TRACING_TARGET_CACHE,
                        removed,
                        "swept expired cache entries"
                    );
                }
            }
        })
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        let now = Instant::now();

        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock since a writer may have
        // replaced the entry in the meantime.
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> CacheResult<()> {
        let entry = CacheEntry::new(value, ttl);
        self.entries.write().await.insert(key.to_owned(), entry);
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> CacheResult<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();

        match pattern {
            None => entries.clear(),
            Some(pattern) => {
                let pattern = KeyPattern::new(pattern)?;
                entries.retain(|key, _| !pattern.matches(key));
            }
        }

        Ok(before - entries.len())
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Memory
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", json!({"a": 1}), MINUTE).await?;

        assert_eq!(cache.get("k").await?, Some(json!({"a": 1})));
        assert!(cache.has("k").await?);
        assert_eq!(cache.get("missing").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn set_overwrites_value_and_ttl() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::ZERO).await?;
        cache.set("k", json!(2), MINUTE).await?;

        assert_eq!(cache.get("k").await?, Some(json!(2)));
        assert_eq!(cache.len().await, 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", json!("v"), Duration::from_secs(2)).await?;

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.has("k").await?);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get("k").await?, None);
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn zero_ttl_is_immediately_expired() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", json!(true), Duration::ZERO).await?;
        assert!(!cache.has("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn del_removes_key() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), MINUTE).await?;
        cache.del("k").await?;
        cache.del("never-set").await?;

        assert!(!cache.has("k").await?);
        Ok(())
    }

    #[tokio::test]
    async fn clear_by_pattern() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("p:http:GET:/a", json!(1), MINUTE).await?;
        cache.set("p:http:GET:/b:extra", json!(2), MINUTE).await?;
        cache.set("p:other", json!(3), MINUTE).await?;

        let removed = cache.clear(Some("p:http:*")).await?;
        assert_eq!(removed, 2);
        assert!(cache.has("p:other").await?);
        assert!(!cache.has("p:http:GET:/a").await?);
        Ok(())
    }

    #[tokio::test]
    async fn clear_everything() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), MINUTE).await?;
        cache.set("b", json!(2), MINUTE).await?;

        assert_eq!(cache.clear(None).await?, 2);
        assert!(cache.is_empty().await);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Duration::from_secs(1)).await?;
        cache.set("long", json!(2), MINUTE).await?;

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(cache.sweep_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.has("long").await?);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_periodically() -> anyhow::Result<()> {
        let cache = MemoryCache::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(10));
        cache.set("k", json!(1), Duration::from_secs(1)).await?;

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(cache.is_empty().await);

        handle.abort();
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_cache_dropped() {
        let cache = MemoryCache::new();
        let handle = cache.spawn_sweeper(Duration::from_secs(1));
        drop(cache);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.is_finished());
    }
}
