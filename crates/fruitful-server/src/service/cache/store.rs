//! Storage abstraction behind the cache service.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::CacheResult;

/// Storage backend selected for the cache.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::AsRefStr
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheBackend {
    /// In-process map with per-entry expiration.
    Memory,
    /// A remote store was requested but is not reachable.
    ///
    /// Every read misses and every write is discarded.
    Unavailable,
}

/// Key-value store holding JSON values with an expiration.
///
/// Implementations must be safe to share between request handlers.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Returns the live value stored under `key`.
    async fn get(&self, key: &str) -> CacheResult<Option<serde_json::Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) -> CacheResult<()>;

    /// Removes `key`. Missing keys are not an error.
    async fn del(&self, key: &str) -> CacheResult<()>;

    /// Removes every key matching the glob `pattern`, or everything when `None`.
    ///
    /// Returns the number of removed entries.
    async fn clear(&self, pattern: Option<&str>) -> CacheResult<usize>;

    /// Returns `true` if a live value is stored under `key`.
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Returns the backend kind.
    fn backend(&self) -> CacheBackend;
}
