//! Cache administration handlers.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{Router, delete};
use serde::Deserialize;

use crate::service::ServiceState;
use crate::service::cache::CacheService;

/// Tracing target for cache administration.
const TRACING_TARGET: &str = "fruitful_server::handler::cache";

/// `Query` params for cache invalidation.
#[derive(Debug, Default, Deserialize)]
struct InvalidateQuery {
    /// Glob matched against whole keys. Clears everything when absent.
    pattern: Option<String>,
}

#[tracing::instrument(skip_all)]
async fn invalidate_cache(
    State(cache): State<CacheService>,
    Query(query): Query<InvalidateQuery>,
) -> StatusCode {
    let removed = match query.pattern.as_deref() {
        Some(pattern) => cache.invalidate(pattern).await,
        None => cache.clear(None).await,
    };

    tracing::info!(
        target: TRACING_TARGET,
        pattern = query.pattern.as_deref().unwrap_or("*"),
        removed,
        "cache invalidated by admin"
    );
    StatusCode::NO_CONTENT
}

/// Returns a [`Router`] with the cache administration routes.
pub fn admin_routes() -> Router<ServiceState> {
    Router::new().route("/api/cache", delete(invalidate_cache))
}
