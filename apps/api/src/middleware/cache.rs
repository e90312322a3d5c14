use axum::Json;
use axum::body::{Body, HttpBody, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fleetgate_application::CacheService;
use fleetgate_core::AppError;
use fleetgate_domain::CacheConfig;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;

const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const MAX_CACHED_BODY_BYTES: usize = 1024 * 1024;

/// Derives the key parts of a cacheable request; `None` bypasses the cache.
pub type CacheKeyFn = fn(&Request) -> Option<Vec<String>>;

/// State of one `cache_response` route layer.
#[derive(Clone)]
pub struct CacheRoute {
    cache: CacheService,
    config: CacheConfig,
    key: CacheKeyFn,
}

impl CacheRoute {
    pub fn new(cache: CacheService, config: CacheConfig, key: CacheKeyFn) -> Self {
        Self { cache, config, key }
    }

    fn key_for(&self, request: &Request) -> Option<String> {
        let parts = (self.key)(request)?;
        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        Some(self.config.key(&parts))
    }
}

/// Serves GET responses from the cache and stores successful JSON bodies
/// under the route's cache domain.
pub async fn cache_response(
    State(route): State<CacheRoute>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        return next.run(request).await;
    }
    let Some(key) = route.key_for(&request) else {
        return next.run(request).await;
    };

    if let Some(cached) = route.cache.get::<Value>(key.as_str()).await {
        debug!(key = %key, "response cache hit");
        let mut response = Json(cached).into_response();
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        return response;
    }

    debug!(key = %key, "response cache miss");
    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .and_then(|upper| usize::try_from(upper).ok())
        .is_some_and(|upper| upper <= MAX_CACHED_BODY_BYTES);
    if !fits {
        parts
            .headers
            .insert(X_CACHE, HeaderValue::from_static("MISS"));
        return Response::from_parts(parts, body);
    }

    let bytes = match to_bytes(body, MAX_CACHED_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(error) => {
            return ApiError(AppError::Internal(format!(
                "failed to buffer response for '{key}': {error}"
            )))
            .into_response();
        }
    };

    if let Ok(value) = serde_json::from_slice::<Value>(&bytes) {
        let ttl = Some(route.config.ttl_seconds);
        if !route.cache.set(key.as_str(), &value, ttl).await {
            debug!(key = %key, "response not cached");
        }
    }

    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}
