//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - [`RouterSecurityExt`]: CORS, security headers, compression, body limits
//! - [`RouterObservabilityExt`]: request ids, tracing, 5xx logging
//! - [`RouterRecoveryExt`]: timeouts and panic recovery
//! - [`cache_response`]: JSON response caching per route group
//! - [`attach_features`]: per-request feature flag context
//! - [`rate_limit_by_ip`] and [`require_admin_token`]: request admission

mod admin;
mod caching;
mod features;
mod observability;
mod rate_limiting;
mod recovery;
mod security;

pub use admin::require_admin_token;
pub use caching::{CACHE_STATUS_HEADER, ResponseCacheState, cache_response, response_cache_key};
pub use features::{USER_ID_HEADER, attach_features, identify_from_header};
pub use observability::{RouterObservabilityExt, log_server_errors};
pub use rate_limiting::rate_limit_by_ip;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{
    CorsConfig, FrameOptions, ReferrerPolicy, RouterSecurityExt, SecurityHeadersConfig,
};

/// Maximum request and cached response body size in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

// Tracing target constants for consistent logging.
pub(crate) const TRACING_TARGET_ADMIN: &str = "fruitful_server::middleware::admin";
pub(crate) const TRACING_TARGET_CACHING: &str = "fruitful_server::middleware::caching";
pub(crate) const TRACING_TARGET_HTTP: &str = "fruitful_server::middleware::http";
pub(crate) const TRACING_TARGET_SECURITY: &str = "fruitful_server::middleware::security";
