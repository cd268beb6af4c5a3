//! Response and value caching.
//!
//! [`CacheService`] is the only entry point handlers use. It sits on top of a
//! [`CacheStore`] chosen at startup:
//!
//! - [`MemoryCache`] keeps entries in process with per-entry expiration.
//! - [`UnavailableCache`] is selected when a remote store is requested. It
//!   misses on every read so the portal keeps serving without a cache.

mod config;
mod key;
mod memory;
mod service;
mod store;
mod unavailable;

use std::borrow::Cow;

pub use self::config::CacheConfig;
pub use self::key::{CacheKeyBuilder, DEFAULT_KEY_PREFIX, KeyPattern};
pub use self::memory::{CacheEntry, MemoryCache};
pub use self::service::CacheService;
pub use self::store::{CacheBackend, CacheStore};
pub use self::unavailable::UnavailableCache;

/// Tracing target for cache operations.
pub(crate) const TRACING_TARGET_CACHE: &str = "fruitful_server::service::cache";

/// Errors raised by cache stores.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Key pattern could not be compiled.
    #[error("invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Value could not be converted to or from JSON.
    #[error("cache serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend failed.
    #[error("cache backend error: {0}")]
    Backend(Cow<'static, str>),
}

/// Result type for cache store operations.
pub type CacheResult<T, E = CacheError> = std::result::Result<T, E>;
