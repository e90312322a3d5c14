use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use fleetgate_core::AppError;
use fleetgate_domain::{HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, HEADER_RETRY_AFTER};
use tower_http::cors::CorsLayer;

pub(super) fn build_cors_layer(frontend_url: &str) -> Result<CorsLayer, AppError> {
    let exposed: Vec<HeaderName> = [
        HEADER_LIMIT,
        HEADER_REMAINING,
        HEADER_RESET,
        HEADER_RETRY_AFTER,
    ]
    .iter()
    .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
    .collect();

    Ok(CorsLayer::new()
        .allow_origin(
            HeaderValue::from_str(frontend_url)
                .map_err(|error| AppError::Internal(format!("invalid FRONTEND_URL: {error}")))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .expose_headers(exposed))
}
