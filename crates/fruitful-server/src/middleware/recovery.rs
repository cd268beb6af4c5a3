//! Outermost safety net of the portal API.
//!
//! Requests running longer than `REQUEST_TIMEOUT` are abandoned with
//! `504 request_timeout`. A panicking handler yields `500
//! internal_server_error`; the panic message is logged but never sent to
//! the client.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{Method, Uri};
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::{Error, ErrorKind};

const TRACING_TARGET_ERROR: &str = "fruitful_server::recovery::error";
const TRACING_TARGET_PANIC: &str = "fruitful_server::recovery::panic";

/// Default request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

type Panic = Box<dyn Any + Send + 'static>;

/// Request timeout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RecoveryConfig {
    /// Seconds a request may run before it is answered with `504`.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REQUEST_TIMEOUT", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)
    )]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::with_timeout_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
    }
}

impl RecoveryConfig {
    /// Times requests out after `secs` seconds.
    pub fn with_timeout_secs(secs: u64) -> Self {
        Self {
            request_timeout: secs,
        }
    }

    /// Returns the request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Extension trait for `axum::`[`Router`] to apply the recovery layers.
pub trait RouterRecoveryExt<S> {
    /// Layers the request timeout and panic recovery.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        let middlewares = ServiceBuilder::new()
            .layer(HandleErrorLayer::new(timeout_response))
            .layer(CatchPanicLayer::custom(panic_response))
            .layer(TimeoutLayer::new(config.request_timeout()));

        self.layer(middlewares)
    }
}

async fn timeout_response(method: Method, uri: Uri, err: BoxError) -> Response {
    if err.is::<Elapsed>() {
        tracing::warn!(
            target: TRACING_TARGET_ERROR,
            %method,
            path = uri.path(),
            "request timed out"
        );

        return Error::new(ErrorKind::RequestTimeout)
            .with_context("The request took too long to process and was terminated")
            .into_response();
    }

    tracing::error!(
        target: TRACING_TARGET_ERROR,
        %method,
        path = uri.path(),
        error = %err,
        "middleware failed"
    );
    ErrorKind::InternalServerError.into_response()
}

fn panic_message(panic: &Panic) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload")
}

fn panic_response(panic: Panic) -> Response {
    tracing::error!(
        target: TRACING_TARGET_PANIC,
        message = panic_message(&panic),
        "handler panicked"
    );

    Error::new(ErrorKind::InternalServerError)
        .with_message("An unexpected error occurred")
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum_test::TestServer;
    use serde_json::Value;

    use super::*;

    #[tokio::test]
    async fn panics_become_500_without_leaking() -> anyhow::Result<()> {
        async fn boom() -> &'static str {
            panic!("secret handler state")
        }

        let app = Router::new()
            .route("/", get(boom))
            .with_recovery(&RecoveryConfig::default());
        let server = TestServer::new(app)?;

        let response = server.get("/").expect_failure().await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.json::<Value>()["name"], "internal_server_error");
        assert!(!response.text().contains("secret handler state"));
        Ok(())
    }

    #[test]
    fn panic_payloads_are_readable() {
        let owned: Panic = Box::new(String::from("owned"));
        let borrowed: Panic = Box::new("borrowed");
        let other: Panic = Box::new(7_u8);

        assert_eq!(panic_message(&owned), "owned");
        assert_eq!(panic_message(&borrowed), "borrowed");
        assert_eq!(panic_message(&other), "non-string panic payload");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() -> anyhow::Result<()> {
        async fn slow() -> &'static str {
            tokio::time::sleep(Duration::from_secs(60)).await;
            "late"
        }

        let app = Router::new()
            .route("/", get(slow))
            .with_recovery(&RecoveryConfig::with_timeout_secs(1));
        let server = TestServer::new(app)?;

        let response = server.get("/").expect_failure().await;
        response.assert_status(StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(response.json::<Value>()["name"], "request_timeout");
        Ok(())
    }
}
