use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use fleetgate_core::AppError;
use fleetgate_domain::{CacheWarmingMetrics, events};
use tracing::info;

use crate::dto::{
    EventResponse, InvalidateCacheRequest, InvalidateCacheResponse, ResetRateLimitRequest,
    ResetRateLimitResponse, ViolationsQuery, ViolationsResponse, WarmCacheRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_VIOLATIONS_PAGE: usize = 50;

pub async fn list_violations_handler(
    State(state): State<AppState>,
    Query(query): Query<ViolationsQuery>,
) -> Json<ViolationsResponse> {
    let log = state.violation_log.as_ref();
    let limit = query.limit.unwrap_or(DEFAULT_VIOLATIONS_PAGE);

    Json(ViolationsResponse {
        capacity: log.capacity(),
        total: log.len(),
        by_endpoint: log.summary(),
        violations: log.recent(limit),
    })
}

pub async fn clear_violations_handler(State(state): State<AppState>) -> StatusCode {
    state.violation_log.clear();
    StatusCode::NO_CONTENT
}

pub async fn reset_rate_limit_handler(
    State(state): State<AppState>,
    Json(payload): Json<ResetRateLimitRequest>,
) -> ApiResult<Json<ResetRateLimitResponse>> {
    let identifier = payload.identifier.trim();
    if identifier.is_empty() {
        return Err(AppError::Validation("identifier is required".to_owned()).into());
    }

    let config = state
        .rate_limit_policies
        .effective()
        .into_iter()
        .find(|(name, _)| *name == payload.policy)
        .map(|(_, config)| config)
        .ok_or_else(|| {
            AppError::Validation(format!("unknown rate limit policy '{}'", payload.policy))
        })?;

    let reset = state.rate_limit_service.reset(identifier, &config).await;
    info!(policy = %payload.policy, identifier = %identifier, reset, "rate limit reset");

    Ok(Json(ResetRateLimitResponse {
        identifier: identifier.to_owned(),
        policy: payload.policy,
        reset,
    }))
}

pub async fn warm_cache_handler(
    State(state): State<AppState>,
    payload: Option<Json<WarmCacheRequest>>,
) -> Json<CacheWarmingMetrics> {
    let overrides = payload.map(|Json(payload)| payload).unwrap_or_default();
    let mut options = state.warming_options;
    if let Some(popular_limit) = overrides.popular_limit {
        options.popular_limit = popular_limit;
    }
    if let Some(days_ahead) = overrides.days_ahead {
        options.days_ahead = days_ahead;
    }
    if let Some(max_concurrency) = overrides.max_concurrency {
        options.max_concurrency = max_concurrency;
    }
    if let Some(batch_size) = overrides.batch_size {
        options.batch_size = batch_size;
    }

    Json(state.cache_warmer.warm_cache(options).await)
}

pub async fn warming_metrics_handler(
    State(state): State<AppState>,
) -> ApiResult<Json<CacheWarmingMetrics>> {
    let metrics = state
        .cache_warmer
        .metrics()
        .await
        .ok_or_else(|| AppError::NotFound("no cache warming run has finished yet".to_owned()))?;

    Ok(Json(metrics))
}

pub async fn invalidate_cache_handler(
    State(state): State<AppState>,
    Json(payload): Json<InvalidateCacheRequest>,
) -> ApiResult<Json<InvalidateCacheResponse>> {
    let pattern = payload
        .pattern
        .as_deref()
        .map(str::trim)
        .filter(|pattern| !pattern.is_empty());
    let event = payload
        .event
        .as_deref()
        .map(str::trim)
        .filter(|event| !event.is_empty());
    if pattern.is_none() && event.is_none() && payload.tags.is_empty() {
        return Err(AppError::Validation(
            "one of pattern, tags or event is required".to_owned(),
        )
        .into());
    }

    let mut removed = 0;
    if let Some(pattern) = pattern {
        removed += state.cache_service.invalidate(pattern).await;
    }
    if !payload.tags.is_empty() {
        let tags: Vec<&str> = payload.tags.iter().map(String::as_str).collect();
        removed += state.cache_service.invalidate_by_tags(&tags).await;
    }
    if let Some(event) = event {
        removed += state.cache_invalidator.handle_event(event).await;
    }

    Ok(Json(InvalidateCacheResponse { removed }))
}

pub async fn car_updated_handler(
    State(state): State<AppState>,
    Path(car_id): Path<String>,
) -> ApiResult<Json<EventResponse>> {
    if state.fleet.car(car_id.as_str()).await.is_none() {
        return Err(AppError::NotFound(format!("car '{car_id}' does not exist")).into());
    }

    let removed = state
        .cache_invalidator
        .handle_event(events::CAR_UPDATED)
        .await;
    info!(car_id = %car_id, removed, "car update propagated to caches");

    Ok(Json(EventResponse {
        event: events::CAR_UPDATED,
        removed,
    }))
}
