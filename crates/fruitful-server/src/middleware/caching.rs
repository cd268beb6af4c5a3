//! Response caching for JSON `GET` endpoints.
//!
//! Attach per route group with
//! `route_layer(from_fn_with_state(ResponseCacheState::new(cache, ttl), cache_response))`.

use std::time::Duration;

use axum::Json;
use axum::body::{Body, HttpBody};
use axum::extract::{OriginalUri, Request, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::{DEFAULT_MAX_BODY_SIZE, TRACING_TARGET_CACHING};
use crate::handler::ErrorKind;
use crate::service::cache::CacheService;

/// Header reporting whether a response was served from the cache.
pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Cache and lifetime used by [`cache_response`] on one route group.
#[derive(Debug, Clone)]
pub struct ResponseCacheState {
    cache: CacheService,
    ttl: Option<Duration>,
}

impl ResponseCacheState {
    /// Caches responses for `ttl`, or the cache default when `None`.
    pub fn new(cache: CacheService, ttl: Option<Duration>) -> Self {
        Self { cache, ttl }
    }
}

/// Builds the cache key of a request.
///
/// The query string is decoded into a JSON object with sorted keys, so
/// parameter order does not matter. The last of repeated parameters wins.
pub fn response_cache_key(cache: &CacheService, method: &Method, uri: &Uri) -> String {
    let query: serde_json::Map<String, serde_json::Value> = uri
        .query()
        .map(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (key.into_owned(), serde_json::Value::from(value.into_owned())))
                .collect()
        })
        .unwrap_or_default();

    cache
        .key()
        .add("http")
        .add(method)
        .add(uri.path())
        .add(serde_json::Value::Object(query))
        .build()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

fn with_cache_status(mut response: Response, status: &'static str) -> Response {
    response
        .headers_mut()
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static(status));
    response
}

/// Serves cached JSON bodies and stores fresh successful JSON responses.
///
/// Stores happen in a background task, so the response never waits for the
/// cache and a cache failure never fails the request.
pub async fn cache_response(
    State(state): State<ResponseCacheState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }

    // Nested routers see a stripped path, so key on the original one.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or(request.uri(), |original| &original.0);
    let key = response_cache_key(&state.cache, request.method(), uri);

    if let Some(body) = state.cache.get::<serde_json::Value>(&key).await {
        tracing::debug!(target: TRACING_TARGET_CACHING, key = %key, "response cache hit");
        return with_cache_status((StatusCode::OK, Json(body)).into_response(), "HIT");
    }

    let response = next.run(request).await;
    if !response.status().is_success() || !is_json(response.headers()) {
        return response;
    }

    let (parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= DEFAULT_MAX_BODY_SIZE as u64);
    if !fits {
        tracing::debug!(target: TRACING_TARGET_CACHING, key = %key, "response too large to cache");
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, DEFAULT_MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!(
                target: TRACING_TARGET_CACHING,
                key = %key,
                error = %error,
                "cannot buffer response body"
            );
            return ErrorKind::InternalServerError.into_response();
        }
    };

    match serde_json::from_slice::<serde_json::Value>(&bytes) {
        Ok(value) => {
            tracing::debug!(target: TRACING_TARGET_CACHING, key = %key, "response cache miss, storing");
            state.cache.set_detached(key, value, state.ttl);
        }
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET_CACHING,
                key = %key,
                error = %error,
                "response is not valid json, not cached"
            );
        }
    }

    with_cache_status(Response::from_parts(parts, Body::from(bytes)), "MISS")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::Router;
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum_test::TestServer;
    use serde_json::json;

    use super::*;
    use crate::service::cache::MemoryCache;

    fn cache() -> CacheService {
        CacheService::new(MemoryCache::new(), "p", Duration::from_secs(60))
    }

    fn app(cache: CacheService, calls: Arc<AtomicUsize>) -> Router {
        let counted = calls.clone();
        Router::new()
            .route(
                "/brands",
                get(move || {
                    let calls = counted.clone();
                    async move {
                        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                        Json(json!({"calls": n}))
                    }
                }),
            )
            .route("/text", get(|| async { "plain" }))
            .route("/missing", get(|| async { ErrorKind::NotFound.into_error() }))
            .route_layer(from_fn_with_state(
                ResponseCacheState::new(cache, None),
                cache_response,
            ))
    }

    async fn wait_for(cache: &CacheService, key: &str) {
        for _ in 0..100 {
            if cache.has(key).await {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("cache write for {key} never landed");
    }

    #[test]
    fn key_sorts_query_parameters() {
        let cache = cache();
        let first = response_cache_key(&cache, &Method::GET, &Uri::from_static("/a?b=2&a=1"));
        let second = response_cache_key(&cache, &Method::GET, &Uri::from_static("/a?a=1&b=2"));

        assert_eq!(first, second);
        assert_eq!(first, r#"p:http:GET:/a:{"a":"1","b":"2"}"#);
    }

    #[test]
    fn key_without_query_uses_empty_object() {
        let key = response_cache_key(&cache(), &Method::GET, &Uri::from_static("/brands"));
        assert_eq!(key, "p:http:GET:/brands:{}");
    }

    #[test]
    fn key_keeps_last_duplicate() {
        let key = response_cache_key(&cache(), &Method::GET, &Uri::from_static("/a?x=1&x=2"));
        assert_eq!(key, r#"p:http:GET:/a:{"x":"2"}"#);
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() -> anyhow::Result<()> {
        let cache = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let server = TestServer::new(app(cache.clone(), calls.clone()))?;

        let first = server.get("/brands").add_query_param("page", 1).await;
        first.assert_json(&json!({"calls": 1}));
        assert_eq!(first.header(CACHE_STATUS_HEADER), "MISS");

        wait_for(&cache, r#"p:http:GET:/brands:{"page":"1"}"#).await;

        let second = server.get("/brands").add_query_param("page", 1).await;
        second.assert_json(&json!({"calls": 1}));
        assert_eq!(second.header(CACHE_STATUS_HEADER), "HIT");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let other_page = server.get("/brands").add_query_param("page", 2).await;
        other_page.assert_json(&json!({"calls": 2}));
        Ok(())
    }

    #[tokio::test]
    async fn non_json_and_errors_are_not_cached() -> anyhow::Result<()> {
        let cache = cache();
        let server = TestServer::new(app(cache.clone(), Arc::default()))?;

        server.get("/text").await.assert_text("plain");
        server.get("/missing").expect_failure().await.assert_status_not_found();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(cache.clear(None).await, 0);
        Ok(())
    }
}
