//! Backend used when a remote store is configured but cannot be reached.

use std::time::Duration;

use super::{CacheBackend, CacheResult, CacheStore, TRACING_TARGET_CACHE};

/// Cache that stores nothing.
///
/// Stands in for a remote store so callers keep working without it: reads
/// always miss and writes, deletes and clears succeed without effect.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableCache;

#[async_trait::async_trait]
impl CacheStore for UnavailableCache {
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>> {
        tracing::trace!(target: TRACING_TARGET_CACHE, key, "cache unavailable, miss");
        Ok(None)
    }

    async fn set(&self, key: &str, _value: serde_json::Value, _ttl: Duration) -> CacheResult<()> {
        tracing::trace!(target: TRACING_TARGET_CACHE, key, "cache unavailable, write dropped");
        Ok(())
    }

    async fn del(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn clear(&self, pattern: Option<&str>) -> CacheResult<usize> {
        tracing::debug!(
            target: TRACING_TARGET_CACHE,
            pattern = pattern.unwrap_or("*"),
            "cache unavailable, nothing to clear"
        );
        Ok(0)
    }

    async fn has(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    fn backend(&self) -> CacheBackend {
        CacheBackend::Unavailable
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn never_stores_anything() -> anyhow::Result<()> {
        let cache = UnavailableCache;
        cache.set("k", json!(1), Duration::from_secs(60)).await?;

        assert_eq!(cache.get("k").await?, None);
        assert!(!cache.has("k").await?);
        assert_eq!(cache.clear(None).await?, 0);
        assert_eq!(cache.backend(), CacheBackend::Unavailable);
        Ok(())
    }
}
