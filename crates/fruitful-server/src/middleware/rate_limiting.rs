//! IP-based rate limiting middleware.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::service::security::RateLimiter;

/// Rate limits requests by client IP address.
///
/// The address comes from [`ConnectInfo`], so the server must be started
/// with `into_make_service_with_connect_info::<SocketAddr>()`. Requests
/// without it are let through.
pub async fn rate_limit_by_ip(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>().copied()
    else {
        return next.run(request).await;
    };

    match limiter.check(addr.ip()).await {
        Ok(()) => next.run(request).await,
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::{Extension, Router};
    use axum_test::TestServer;

    use super::*;
    use crate::service::security::RateLimitConfig;

    #[tokio::test]
    async fn limits_by_connection_address() -> anyhow::Result<()> {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(1));
        let addr = SocketAddr::from(([10, 0, 0, 1], 4000));

        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, rate_limit_by_ip))
            .layer(Extension(ConnectInfo(addr)));
        let server = TestServer::new(app)?;

        server.get("/").await.assert_status_ok();
        let limited = server.get("/").expect_failure().await;
        limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.json::<serde_json::Value>()["name"], "too_many_requests");
        Ok(())
    }

    #[tokio::test]
    async fn passes_without_connection_info() -> anyhow::Result<()> {
        let limiter = RateLimiter::new(RateLimitConfig::per_minute(1));
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(limiter, rate_limit_by_ip));
        let server = TestServer::new(app)?;

        server.get("/").await.assert_status_ok();
        server.get("/").await.assert_status_ok();
        Ok(())
    }
}
