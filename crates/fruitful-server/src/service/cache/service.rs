use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    CacheBackend, CacheConfig, CacheKeyBuilder, CacheStore, MemoryCache, TRACING_TARGET_CACHE,
    UnavailableCache,
};

/// Best-effort cache facade shared across handlers.
///
/// No operation fails from the caller's point of view: store or
/// (de)serialization errors are logged and reported as misses or no-ops.
#[derive(Clone)]
pub struct CacheService {
    store: Arc<dyn CacheStore>,
    key_prefix: Arc<str>,
    default_ttl: Duration,
}

impl CacheService {
    /// Wraps an existing store.
    pub fn new(
        store: impl CacheStore,
        key_prefix: impl Into<Arc<str>>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            store: Arc::new(store),
            key_prefix: key_prefix.into(),
            default_ttl,
        }
    }

    /// Builds the service with the backend selected by `config`.
    ///
    /// The in-process store starts its expiration sweeper, so this must be
    /// called from within a Tokio runtime.
    pub fn from_config(config: &CacheConfig) -> Self {
        let prefix = config.key_prefix.as_str();

        match config.backend() {
            CacheBackend::Memory => {
                let memory = MemoryCache::new();
                memory.spawn_sweeper(config.sweep_interval());

                tracing::info!(
                    target: TRACING_TARGET_CACHE,
                    backend = %CacheBackend::Memory,
                    ttl_secs = config.ttl_secs,
                    key_prefix = prefix,
                    "cache initialized"
                );

                Self::new(memory, prefix, config.ttl())
            }
            CacheBackend::Unavailable => {
                tracing::warn!(
                    target: TRACING_TARGET_CACHE,
                    redis_url = config.redis_url_masked().as_deref().unwrap_or_default(),
                    "remote cache store requested but not available, caching disabled"
                );

                Self::new(UnavailableCache, prefix, config.ttl())
            }
        }
    }

    /// Returns a key builder seeded with the configured prefix.
    #[inline]
    pub fn key(&self) -> CacheKeyBuilder {
        CacheKeyBuilder::new(&*self.key_prefix)
    }

    /// Returns the configured key prefix.
    #[inline]
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    /// Returns the lifetime applied when none is given.
    #[inline]
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Returns the active backend.
    #[inline]
    pub fn backend(&self) -> CacheBackend {
        self.store.backend()
    }

    /// Reads and decodes the value stored under `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.store.get(key).await {
            Ok(value) => value?,
            Err(error) => {
                tracing::warn!(target: TRACING_TARGET_CACHE, key, error = %error, "cache read failed");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_CACHE,
                    key,
                    error = %error,
                    "cached value has unexpected shape"
                );
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl`, or the default lifetime.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if let Some(value) = Self::encode(key, value) {
            self.store_value(key, value, ttl).await;
        }
    }

    /// Stores `value` in a background task without waiting for the write.
    ///
    /// The value is serialized before the task starts; write failures are
    /// logged by the task.
    pub fn set_detached<T: Serialize>(&self, key: String, value: T, ttl: Option<Duration>) {
        let Some(value) = Self::encode(&key, &value) else {
            return;
        };

        let cache = self.clone();
        tokio::spawn(async move {
            cache.store_value(&key, value, ttl).await;
        });
    }

    fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Option<Value> {
        serde_json::to_value(value)
            .inspect_err(|error| {
                tracing::error!(
                    target: TRACING_TARGET_CACHE,
                    key,
                    error = %error,
                    "cannot serialize value for cache"
                );
            })
            .ok()
    }

    async fn store_value(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(error) = self.store.set(key, value, ttl).await {
            tracing::error!(target: TRACING_TARGET_CACHE, key, error = %error, "cache write failed");
        }
    }

    /// Removes `key`.
    pub async fn del(&self, key: &str) {
        if let Err(error) = self.store.del(key).await {
            tracing::error!(target: TRACING_TARGET_CACHE, key, error = %error, "cache delete failed");
        }
    }

    /// Removes every key matching `pattern`, or everything when `None`.
    ///
    /// Returns the number of removed entries.
    pub async fn clear(&self, pattern: Option<&str>) -> usize {
        match self.store.clear(pattern).await {
            Ok(removed) => removed,
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET_CACHE,
                    pattern = pattern.unwrap_or("*"),
                    error = %error,
                    "cache clear failed"
                );
                0
            }
        }
    }

    /// Returns `true` if a live value is stored under `key`.
    pub async fn has(&self, key: &str) -> bool {
        match self.store.has(key).await {
            Ok(found) => found,
            Err(error) => {
                tracing::warn!(target: TRACING_TARGET_CACHE, key, error = %error, "cache lookup failed");
                false
            }
        }
    }

    /// Clears every key matching `pattern` and logs the outcome.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        let removed = self.clear(Some(pattern)).await;
        tracing::info!(target: TRACING_TARGET_CACHE, pattern, removed, "cache invalidated");
        removed
    }
}

impl Default for CacheService {
    fn default() -> Self {
        let config = CacheConfig::default();
        let ttl = config.ttl();
        Self::new(MemoryCache::new(), config.key_prefix, ttl)
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.backend())
            .field("key_prefix", &self.key_prefix)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::service::cache::{CacheError, CacheResult};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Brand {
        id: u32,
        name: String,
    }

    fn cache() -> CacheService {
        CacheService::new(MemoryCache::new(), "test", Duration::from_secs(60))
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    #[async_trait::async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &str) -> CacheResult<Option<serde_json::Value>> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(&self, _: &str, _: serde_json::Value, _: Duration) -> CacheResult<()> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn del(&self, _: &str) -> CacheResult<()> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn clear(&self, _: Option<&str>) -> CacheResult<usize> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn has(&self, _: &str) -> CacheResult<bool> {
            Err(CacheError::Backend("connection refused".into()))
        }

        fn backend(&self) -> CacheBackend {
            CacheBackend::Unavailable
        }
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let cache = cache();
        let brand = Brand { id: 1, name: "Acme".into() };
        cache.set("brand:1", &brand, None).await;

        assert_eq!(cache.get::<Brand>("brand:1").await, Some(brand));
        assert!(cache.has("brand:1").await);
    }

    #[tokio::test]
    async fn shape_mismatch_is_a_miss() {
        let cache = cache();
        cache.set("k", &json!("not a brand"), None).await;
        assert_eq!(cache.get::<Brand>("k").await, None);
    }

    #[tokio::test]
    async fn store_failures_never_surface() {
        let cache = CacheService::new(BrokenStore, "test", Duration::from_secs(60));

        cache.set("k", &1, None).await;
        cache.del("k").await;
        assert_eq!(cache.get::<i32>("k").await, None);
        assert!(!cache.has("k").await);
        assert_eq!(cache.clear(None).await, 0);
    }

    #[tokio::test]
    async fn invalidate_by_pattern() {
        let cache = cache();
        let key = cache.key().add("http").add("GET").add("/api/brands").build();
        cache.set(&key, &json!([1, 2]), None).await;
        cache.set("test:other", &json!(1), None).await;

        assert_eq!(cache.invalidate("test:http:*").await, 1);
        assert!(!cache.has(&key).await);
        assert!(cache.has("test:other").await);
    }

    #[tokio::test]
    async fn literal_pattern_matches_whole_key() {
        let cache = cache();
        cache.set("test:a", &1, None).await;
        cache.set("test:ab", &2, None).await;
        assert_eq!(cache.clear(Some("")).await, 0);
        assert_eq!(cache.clear(Some("test:a")).await, 1);
        assert!(cache.has("test:ab").await);
    }

    #[tokio::test]
    async fn detached_write_lands_eventually() {
        let cache = cache();
        cache.set_detached("test:bg".to_owned(), json!({"ok": true}), None);

        for _ in 0..50 {
            if cache.has("test:bg").await {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("detached write never landed");
    }

    #[tokio::test]
    async fn detached_write_accepts_non_sync_values() {
        let cache = cache();
        cache.set_detached("test:cell".to_owned(), std::cell::Cell::new(7), None);

        for _ in 0..50 {
            if let Some(value) = cache.get::<u32>("test:cell").await {
                assert_eq!(value, 7);
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("detached write never landed");
    }

    #[test]
    fn default_uses_config_defaults() {
        let cache = CacheService::default();
        assert_eq!(cache.backend(), CacheBackend::Memory);
        assert_eq!(cache.default_ttl(), Duration::from_secs(3600));
        assert_eq!(cache.key().add("x").build(), "fruitfulplanet:x");
    }

    #[tokio::test]
    async fn unavailable_backend_from_config() {
        let config = CacheConfig::default()
            .with_enable_cache(true)
            .with_redis_url("redis://localhost:6379");
        let cache = CacheService::from_config(&config);

        assert_eq!(cache.backend(), CacheBackend::Unavailable);
        cache.set("k", &1, None).await;
        assert!(!cache.has("k").await);
    }

    #[tokio::test]
    async fn key_uses_prefix() {
        let cache = CacheService::from_config(&CacheConfig::default().with_key_prefix("app:"));
        assert_eq!(cache.key().add("x").build(), "app:x");
        assert_eq!(cache.backend(), CacheBackend::Memory);
    }
}
