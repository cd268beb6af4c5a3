//! Request admission: per-client rate limiting and the admin token.

mod admin_token;
mod rate_limiter;

pub use admin_token::AdminToken;
pub use rate_limiter::{DEFAULT_REQUESTS_PER_MINUTE, RateLimitConfig, RateLimiter};
