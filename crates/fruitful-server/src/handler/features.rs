//! Feature flag handlers.
//!
//! `GET /api/features/enabled` is public. The remaining routes administer the
//! in-process flag store and are only mounted behind the admin token.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{Router, get, post};
use serde::{Deserialize, Serialize};

use crate::extract::FeatureContext;
use crate::handler::{ErrorKind, Result};
use crate::service::ServiceState;
use crate::service::cache::CacheService;
use crate::service::features::{FeatureFlag, FeatureFlagUpdate, FeatureStore, MAX_ROLLOUT};

/// Tracing target for feature flag operations.
const TRACING_TARGET: &str = "fruitful_server::handler::features";

/// `Path` param for `{name}` handlers.
#[derive(Debug, Deserialize)]
struct FlagPathParams {
    name: String,
}

/// Flags enabled for the calling user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnabledFeaturesResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    features: Vec<String>,
}

fn validate_rollout(rollout: Option<u8>) -> Result<()> {
    match rollout {
        Some(percentage) if percentage > MAX_ROLLOUT => Err(ErrorKind::BadRequest
            .with_message("Rollout percentage must be between 0 and 100")),
        _ => Ok(()),
    }
}

/// Drops cached responses of every `/api/features` route.
async fn invalidate_cached_flags(cache: &CacheService) {
    let pattern = cache
        .key()
        .add("http")
        .add("*")
        .add("/api/features*")
        .build();
    cache.invalidate(&pattern).await;
}

async fn enabled_features(features: FeatureContext) -> Json<EnabledFeaturesResponse> {
    Json(EnabledFeaturesResponse {
        user_id: features.user_id().map(str::to_owned),
        features: features.enabled(),
    })
}

async fn list_flags(State(store): State<FeatureStore>) -> Json<Vec<FeatureFlag>> {
    Json(store.get_all())
}

async fn read_flag(
    State(store): State<FeatureStore>,
    Path(path_params): Path<FlagPathParams>,
) -> Result<Json<FeatureFlag>> {
    store
        .get(&path_params.name)
        .map(Json)
        .ok_or_else(|| ErrorKind::NotFound.with_resource("feature flag"))
}

#[tracing::instrument(skip_all)]
async fn create_flag(
    State(store): State<FeatureStore>,
    State(cache): State<CacheService>,
    Json(flag): Json<FeatureFlag>,
) -> Result<(StatusCode, Json<FeatureFlag>)> {
    if flag.name.trim().is_empty() {
        return Err(ErrorKind::BadRequest.with_message("Feature flag name must not be empty"));
    }
    validate_rollout(flag.rollout_percentage)?;

    store.add(flag.clone());
    invalidate_cached_flags(&cache).await;

    tracing::info!(target: TRACING_TARGET, flag = %flag.name, "feature flag created");
    Ok((StatusCode::CREATED, Json(flag)))
}

#[tracing::instrument(skip_all)]
async fn update_flag(
    State(store): State<FeatureStore>,
    State(cache): State<CacheService>,
    Path(path_params): Path<FlagPathParams>,
    Json(update): Json<FeatureFlagUpdate>,
) -> Result<Json<FeatureFlag>> {
    validate_rollout(update.rollout_percentage)?;

    if !store.update(&path_params.name, update) {
        return Err(ErrorKind::NotFound.with_resource("feature flag"));
    }
    invalidate_cached_flags(&cache).await;

    store
        .get(&path_params.name)
        .map(Json)
        .ok_or_else(|| ErrorKind::NotFound.with_resource("feature flag"))
}

#[tracing::instrument(skip_all)]
async fn delete_flag(
    State(store): State<FeatureStore>,
    State(cache): State<CacheService>,
    Path(path_params): Path<FlagPathParams>,
) -> Result<StatusCode> {
    if !store.remove(&path_params.name) {
        return Err(ErrorKind::NotFound.with_resource("feature flag"));
    }
    invalidate_cached_flags(&cache).await;

    tracing::warn!(target: TRACING_TARGET, flag = %path_params.name, "feature flag deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip_all)]
async fn reset_flags(
    State(store): State<FeatureStore>,
    State(cache): State<CacheService>,
) -> Json<Vec<FeatureFlag>> {
    store.reset();
    invalidate_cached_flags(&cache).await;

    tracing::warn!(target: TRACING_TARGET, "feature flags reset");
    Json(store.get_all())
}

/// Returns a [`Router`] with the public feature routes.
pub fn public_routes() -> Router<ServiceState> {
    Router::new().route("/api/features/enabled", get(enabled_features))
}

/// Returns a [`Router`] with the admin routes.
pub fn admin_routes() -> Router<ServiceState> {
    Router::new()
        .route("/api/features", get(list_flags).post(create_flag))
        .route("/api/features/reset", post(reset_flags))
        .route(
            "/api/features/{name}",
            get(read_flag).patch(update_flag).delete(delete_flag),
        )
}
