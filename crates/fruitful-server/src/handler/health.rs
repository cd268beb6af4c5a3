//! Liveness, readiness and detailed health probes.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{Router, get};

use crate::service::ServiceState;
use crate::service::health::{
    DetailedReport, HealthService, LivenessReport, OverallStatus, ReadinessReport,
};

/// Tracing target for health probe operations.
const TRACING_TARGET: &str = "fruitful_server::handler::health";

fn status_code(status: OverallStatus) -> StatusCode {
    if status.is_serving() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn liveness(State(health): State<HealthService>) -> Json<LivenessReport> {
    Json(health.liveness())
}

#[tracing::instrument(skip_all)]
async fn readiness(
    State(health): State<HealthService>,
) -> (StatusCode, Json<ReadinessReport>) {
    let report = health.readiness().await;
    tracing::debug!(target: TRACING_TARGET, status = %report.status, "readiness checked");
    (status_code(report.status), Json(report))
}

#[tracing::instrument(skip_all)]
async fn detailed(State(health): State<HealthService>) -> (StatusCode, Json<DetailedReport>) {
    let report = health.detailed().await;
    tracing::debug!(target: TRACING_TARGET, status = %report.status, "detailed health checked");
    (status_code(report.status), Json(report))
}

/// Returns a [`Router`] with the `/health` probes.
pub fn routes() -> Router<ServiceState> {
    Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/health/detailed", get(detailed))
}
