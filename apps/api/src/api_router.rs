use std::sync::Arc;

use axum::Router;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use fleetgate_application::TracingViolationObserver;
use fleetgate_core::AppError;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{
    CacheRoute, RateLimitLayer, RateLimitOptions, authenticate, cache_response, require_admin,
    with_rate_limit,
};
use crate::state::AppState;

mod cache_keys;
mod cors;


pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let policies = app_state.rate_limit_policies.clone();
    let catalog = app_state.cache_catalog.clone();
    let cache = app_state.cache_service.clone();

    let listing_routes = Router::new()
        .route(
            "/api/fleet",
            get(handlers::fleet::list_fleet_handler).route_layer(from_fn_with_state(
                CacheRoute::new(cache.clone(), catalog.fleet.clone(), cache_keys::fleet_key),
                cache_response,
            )),
        )
        .route(
            "/api/cars/{car_id}",
            get(handlers::fleet::car_details_handler).route_layer(from_fn_with_state(
                CacheRoute::new(cache.clone(), catalog.car_details.clone(), cache_keys::car_key),
                cache_response,
            )),
        );
    let listing_routes = with_rate_limit(
        listing_routes,
        limiter(&app_state, RateLimitOptions::new(policies.api.clone())),
    );

    let search_routes = Router::new().route(
        "/api/cars/{car_id}/availability",
        get(handlers::fleet::car_availability_handler).route_layer(from_fn_with_state(
            CacheRoute::new(
                cache.clone(),
                catalog.availability.clone(),
                cache_keys::availability_key,
            ),
            cache_response,
        )),
    );
    let search_routes = with_rate_limit(
        search_routes,
        limiter(&app_state, RateLimitOptions::new(policies.search.clone())),
    );

    let booking_routes = with_rate_limit(
        Router::new().route(
            "/api/bookings",
            post(handlers::bookings::create_booking_handler),
        ),
        limiter(
            &app_state,
            RateLimitOptions::new(policies.booking.clone())
                .with_dual_limit(policies.booking_user.clone(), app_state.identity.clone()),
        ),
    );

    let payment_routes = with_rate_limit(
        Router::new().route(
            "/api/payments",
            post(handlers::payments::create_payment_handler),
        ),
        limiter(
            &app_state,
            RateLimitOptions::new(policies.payment.clone())
                .with_dual_limit(policies.payment_user.clone(), app_state.identity.clone()),
        ),
    );

    let upload_routes = with_rate_limit(
        Router::new().route("/api/uploads", post(handlers::uploads::upload_handler)),
        limiter(&app_state, RateLimitOptions::new(policies.upload.clone())),
    );

    let account_routes = with_rate_limit(
        Router::new().route("/api/me", get(handlers::me::me_handler)),
        limiter(&app_state, RateLimitOptions::new(policies.auth.clone())),
    );

    let my_bookings_routes = Router::new()
        .route(
            "/api/me/bookings",
            get(handlers::bookings::my_bookings_handler).route_layer(from_fn_with_state(
                CacheRoute::new(
                    cache,
                    catalog.bookings.clone(),
                    cache_keys::user_bookings_key,
                ),
                cache_response,
            )),
        )
        .route_layer(from_fn_with_state(
            app_state.identity.clone(),
            authenticate,
        ));
    let my_bookings_routes = with_rate_limit(
        my_bookings_routes,
        limiter(&app_state, RateLimitOptions::new(policies.api.clone())),
    );

    let admin_routes = Router::new()
        .route(
            "/api/admin/rate-limits/violations",
            get(handlers::admin::list_violations_handler)
                .delete(handlers::admin::clear_violations_handler),
        )
        .route(
            "/api/admin/rate-limits/reset",
            post(handlers::admin::reset_rate_limit_handler),
        )
        .route(
            "/api/admin/cache/warm",
            post(handlers::admin::warm_cache_handler),
        )
        .route(
            "/api/admin/cache/metrics",
            get(handlers::admin::warming_metrics_handler),
        )
        .route(
            "/api/admin/cache/invalidate",
            post(handlers::admin::invalidate_cache_handler),
        )
        .route(
            "/api/admin/cars/{car_id}/updated",
            post(handlers::admin::car_updated_handler),
        )
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(
            app_state.identity.clone(),
            authenticate,
        ));
    let admin_routes = with_rate_limit(
        admin_routes,
        limiter(&app_state, RateLimitOptions::new(policies.admin.clone())),
    );

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(listing_routes)
        .merge(search_routes)
        .merge(booking_routes)
        .merge(payment_routes)
        .merge(upload_routes)
        .merge(account_routes)
        .merge(my_bookings_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}

fn limiter(app_state: &AppState, options: RateLimitOptions) -> RateLimitLayer {
    RateLimitLayer::new(
        app_state.rate_limit_service.clone(),
        app_state.violation_log.clone(),
        app_state.clock.clone(),
        options.with_observer(Arc::new(TracingViolationObserver)),
    )
}
