use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::TRACING_TARGET_ADMIN;
use crate::handler::ErrorKind;
use crate::service::security::AdminToken;

/// Rejects requests without the admin bearer token.
pub async fn require_admin_token(
    State(token): State<AdminToken>,
    request: Request,
    next: Next,
) -> Response {
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        None => {
            tracing::debug!(
                target: TRACING_TARGET_ADMIN,
                path = %request.uri().path(),
                "admin request without bearer token"
            );
            ErrorKind::MissingAuthToken.into_response()
        }
        Some(candidate) if !token.verify(candidate) => {
            tracing::warn!(
                target: TRACING_TARGET_ADMIN,
                path = %request.uri().path(),
                "admin request with invalid token"
            );
            ErrorKind::Unauthorized.into_response()
        }
        Some(_) => next.run(request).await,
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::{HeaderValue, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;

    fn server() -> anyhow::Result<TestServer> {
        let token = AdminToken::new("s3cret").ok_or_else(|| anyhow::anyhow!("blank token"))?;
        let app = Router::new()
            .route("/", get(|| async { "admin" }))
            .route_layer(from_fn_with_state(token, require_admin_token));
        TestServer::new(app)
    }

    #[tokio::test]
    async fn accepts_matching_token() -> anyhow::Result<()> {
        server()?
            .get("/")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer s3cret"))
            .await
            .assert_text("admin");
        Ok(())
    }

    #[tokio::test]
    async fn rejects_missing_and_wrong_tokens() -> anyhow::Result<()> {
        let server = server()?;

        let missing = server.get("/").expect_failure().await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json::<serde_json::Value>()["name"], "missing_auth_token");

        let wrong = server
            .get("/")
            .add_header(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"))
            .expect_failure()
            .await;
        wrong.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.json::<serde_json::Value>()["name"], "unauthorized");
        Ok(())
    }
}
