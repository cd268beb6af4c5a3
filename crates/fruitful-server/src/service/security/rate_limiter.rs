//! In-memory rate limiter using the token bucket algorithm.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::handler::{ErrorKind, Result as HandlerResult};

/// Logging target for rate limiter operations.
const TRACING_TARGET_RATE_LIMIT: &str = "fruitful_server::service::security::rate_limiter";

/// Default number of requests allowed per client and minute.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;

/// Interval between sweeps of idle buckets.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Token bucket for a single client.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: u32,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            tokens: f64::from(capacity),
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * self.refill_rate).min(f64::from(self.capacity));
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        self.refill();

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until the next token is available, rounded up to whole seconds.
    fn time_until_available(&self) -> Duration {
        if self.tokens >= 1.0 || self.refill_rate <= 0.0 {
            return Duration::ZERO;
        }

        let seconds = (1.0 - self.tokens) / self.refill_rate;
        Duration::from_secs_f64(seconds.ceil())
    }

    /// A bucket is idle once it has refilled completely.
    fn is_idle(&mut self) -> bool {
        self.refill();
        self.tokens >= f64::from(self.capacity)
    }
}

/// Rate limit applied to every client address.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Burst size.
    pub capacity: u32,
    /// Tokens regained per second.
    pub refill_rate: f64,
}

impl RateLimitConfig {
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
        }
    }

    /// Allows `requests` per minute with bursts of the same size.
    pub fn per_minute(requests: u32) -> Self {
        Self {
            capacity: requests,
            refill_rate: f64::from(requests) / 60.0,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(DEFAULT_REQUESTS_PER_MINUTE)
    }
}

/// Per-IP rate limiter shared by all request handlers.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<IpAddr, TokenBucket>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Creates a limiter and starts its idle-bucket cleanup task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: RateLimitConfig) -> Self {
        let limiter = Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            config,
        };

        limiter.start_cleanup_task(CLEANUP_INTERVAL);

        tracing::info!(
            target: TRACING_TARGET_RATE_LIMIT,
            capacity = config.capacity,
            refill_rate = config.refill_rate,
            "rate limiter initialized"
        );

        limiter
    }

    /// Returns the applied configuration.
    #[inline]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Consumes one token for `ip` or rejects with `429`.
    pub async fn check(&self, ip: IpAddr) -> HandlerResult<()> {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.config.capacity, self.config.refill_rate));

        if bucket.try_consume() {
            return Ok(());
        }

        let retry_after = bucket.time_until_available();
        tracing::warn!(
            target: TRACING_TARGET_RATE_LIMIT,
            ip = %ip,
            retry_after_secs = retry_after.as_secs(),
            "rate limit exceeded"
        );

        Err(ErrorKind::TooManyRequests.with_context(format!(
            "Rate limit exceeded. Please try again in {} seconds",
            retry_after.as_secs()
        )))
    }

    /// Forgets the bucket of `ip`.
    pub async fn reset(&self, ip: IpAddr) {
        self.buckets.write().await.remove(&ip);
        tracing::debug!(target: TRACING_TARGET_RATE_LIMIT, ip = %ip, "rate limit reset");
    }

    /// Returns the number of tracked clients.
    pub async fn size(&self) -> usize {
        self.buckets.read().await.len()
    }

    /// Drops every bucket that has refilled completely.
    pub async fn cleanup(&self) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_idle());
        before - buckets.len()
    }

    fn start_cleanup_task(&self, interval: Duration) {
        let buckets: Weak<_> = Arc::downgrade(&self.buckets);
        let config = self.config;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(buckets) = buckets.upgrade() else {
                    break;
                };

                let removed = Self { buckets, config }.cleanup().await;
                if removed > 0 {
                    tracing::debug!(
                        target: TRACING_TARGET_RATE_LIMIT,
                        removed_count = removed,
                        "cleaned up idle rate limit buckets"
                    );
                }
            }
        });
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
