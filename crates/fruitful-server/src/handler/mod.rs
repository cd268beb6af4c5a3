//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use fruitful_server::handler::routes;
//! use fruitful_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::default();
//! let state = ServiceState::from_config(&config).await?;
//! let router = routes(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod cache;
mod error;
mod features;
mod health;
mod response;

use std::time::Duration;

use axum::Router;
use axum::extract::FromRef;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::response::ErrorResponse;
use crate::middleware::{
    ResponseCacheState, attach_features, cache_response, identify_from_header, rate_limit_by_ip,
    require_admin_token,
};
use crate::service::ServiceState;
use crate::service::cache::CacheService;
use crate::service::features::FeatureStore;
use crate::service::security::RateLimiter;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Lifetime of cached admin listings.
///
/// Bounds staleness when a detached cache write lands after an invalidation.
const ADMIN_CACHE_TTL: Duration = Duration::from_secs(30);

/// Returns a [`Router`] with the administrative routes.
///
/// Read-only responses are cached until a mutation invalidates them or
/// [`ADMIN_CACHE_TTL`] elapses.
fn admin_routes(state: &ServiceState) -> Option<Router<ServiceState>> {
    let token = state.admin_token()?.clone();
    let response_cache =
        ResponseCacheState::new(CacheService::from_ref(state), Some(ADMIN_CACHE_TTL));

    let router = Router::new()
        .merge(features::admin_routes())
        .merge(cache::admin_routes())
        .route_layer(from_fn_with_state(response_cache, cache_response))
        .route_layer(from_fn_with_state(token, require_admin_token));

    Some(router)
}

/// Returns a [`Router`] with all `/api` routes.
fn api_routes(state: &ServiceState) -> Router<ServiceState> {
    let mut router = features::public_routes();

    if let Some(admin) = admin_routes(state) {
        router = router.merge(admin);
    }

    router
        .route_layer(from_fn_with_state(
            FeatureStore::from_ref(state),
            attach_features,
        ))
        .route_layer(from_fn(identify_from_header))
        .route_layer(from_fn_with_state(
            RateLimiter::from_ref(state),
            rate_limit_by_ip,
        ))
}

/// Returns a [`Router`] with all routes.
///
/// Health probes are exempt from rate limiting. Administrative routes are
/// only mounted when an admin token is configured.
pub fn routes(state: ServiceState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(api_routes(&state))
        .fallback(handler)
        .with_state(state)
}
