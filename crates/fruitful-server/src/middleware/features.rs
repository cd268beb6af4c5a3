use axum::extract::{Request, State};
use axum::http::HeaderName;
use axum::middleware::Next;
use axum::response::Response;

use crate::extract::{AuthenticatedUser, FeatureContext};
use crate::service::features::FeatureStore;

/// Header a trusted upstream gateway uses to pass the caller's identifier.
pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Binds a [`FeatureContext`] for the current caller to the request.
///
/// The caller is the [`AuthenticatedUser`] extension when present.
pub async fn attach_features(
    State(store): State<FeatureStore>,
    mut request: Request,
    next: Next,
) -> Response {
    let user_id = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| user.as_str().to_owned());

    request
        .extensions_mut()
        .insert(FeatureContext::new(store, user_id));

    next.run(request).await
}

/// Inserts an [`AuthenticatedUser`] from the [`USER_ID_HEADER`] header.
///
/// Only mount behind a gateway that sets or strips the header, since
/// clients can otherwise pick their own rollout bucket.
pub async fn identify_from_header(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(&USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(AuthenticatedUser::new);

    if let Some(user) = user {
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::middleware::{from_fn, from_fn_with_state};
    use axum::routing::get;
    use axum_test::TestServer;

    use super::*;
    use crate::service::features::FeatureFlag;

    async fn tracked(features: FeatureContext) -> String {
        format!(
            "{}:{}",
            features.user_id().unwrap_or("anonymous"),
            features.is_enabled("internTracking")
        )
    }

    fn app() -> Router {
        let store = FeatureStore::new(vec![
            FeatureFlag::new("internTracking", true, "").with_rollout(50),
        ]);

        Router::new()
            .route("/", get(tracked))
            .layer(from_fn_with_state(store, attach_features))
            .layer(from_fn(identify_from_header))
    }

    #[tokio::test]
    async fn anonymous_callers_miss_partial_rollouts() -> anyhow::Result<()> {
        let server = TestServer::new(app())?;
        server.get("/").await.assert_text("anonymous:false");
        Ok(())
    }

    #[tokio::test]
    async fn identified_callers_are_bucketed() -> anyhow::Result<()> {
        let server = TestServer::new(app())?;

        // Buckets: user-1 = 25, user-42 = 56.
        server
            .get("/")
            .add_header(USER_ID_HEADER, "user-1")
            .await
            .assert_text("user-1:true");
        server
            .get("/")
            .add_header(USER_ID_HEADER, "user-42")
            .await
            .assert_text("user-42:false");
        Ok(())
    }

    #[tokio::test]
    async fn missing_context_is_server_error() -> anyhow::Result<()> {
        let app = Router::new().route("/", get(tracked));
        let server = TestServer::new(app)?;

        server
            .get("/")
            .expect_failure()
            .await
            .assert_status_internal_server_error();
        Ok(())
    }
}
