use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Request, StatusCode};
use axum::middleware::from_fn;
use axum::response::Response;
use axum::routing::get;
use chrono::{TimeDelta, TimeZone, Utc};
use fleetgate_application::{
    Clock, ManualClock, RateLimitConfig, RateLimitService, RetryPolicy, StoreConnector,
    ViolationLog, ViolationObserver,
};
use fleetgate_domain::RateLimitViolation;
use fleetgate_infrastructure::InMemoryStoreFactory;
use tower::ServiceExt;

use super::client_ip::client_ip;
use super::{RateLimitLayer, RateLimitOptions, require_admin, with_rate_limit};

#[derive(Default)]
struct RecordingObserver {
    identifiers: Mutex<Vec<String>>,
}

impl ViolationObserver for RecordingObserver {
    fn notify(&self, violation: &RateLimitViolation) {
        self.identifiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(violation.identifier.clone());
    }
}

struct Limited {
    router: Router,
    clock: Arc<ManualClock>,
    violations: Arc<ViolationLog>,
    observer: Arc<RecordingObserver>,
}

fn limited_router(max: u32) -> Limited {
    let start = Utc
        .with_ymd_and_hms(2026, 10, 1, 8, 0, 0)
        .single()
        .unwrap_or_default();
    let clock = Arc::new(ManualClock::new(start));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let connector = StoreConnector::new(
        Arc::new(InMemoryStoreFactory::new(dyn_clock.clone())),
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)),
    );
    let violations = Arc::new(ViolationLog::new(10));
    let observer = Arc::new(RecordingObserver::default());

    let config = RateLimitConfig::new(Duration::from_secs(60), max, "burst")
        .unwrap_or_else(|_| unreachable!());
    let layer = RateLimitLayer::new(
        RateLimitService::new(connector, dyn_clock.clone()),
        violations.clone(),
        dyn_clock,
        RateLimitOptions::new(config).with_observer(observer.clone()),
    );
    let router = with_rate_limit(Router::new().route("/burst", get(|| async { "ok" })), layer);

    Limited {
        router,
        clock,
        violations,
        observer,
    }
}

async fn hit(router: &Router, ip: &str) -> Response {
    let request = Request::builder()
        .uri("/burst")
        .header("x-forwarded-for", ip)
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!());

    router
        .clone()
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!())
}

fn header<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[test]
fn client_ip_prefers_the_first_forwarded_hop() {
    let mut headers = HeaderMap::new();
    assert_eq!(client_ip(&headers), "unknown");

    headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
    assert_eq!(client_ip(&headers), "10.0.0.9");

    headers.insert(
        "x-forwarded-for",
        HeaderValue::from_static(" 198.51.100.4 , 10.0.0.1"),
    );
    assert_eq!(client_ip(&headers), "198.51.100.4");
}

#[tokio::test]
async fn allowed_responses_carry_rate_limit_headers() {
    let limited = limited_router(10);

    let response = hit(&limited.router, "198.51.100.4").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "x-ratelimit-limit"), Some("10"));
    assert_eq!(header(&response, "x-ratelimit-remaining"), Some("9"));
    assert!(header(&response, "x-ratelimit-reset").is_some());
    assert_eq!(header(&response, "retry-after"), None);
}

#[tokio::test]
async fn burst_past_the_limit_is_rejected_and_recorded() {
    let limited = limited_router(10);

    for _ in 0..10 {
        let response = hit(&limited.router, "198.51.100.4").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let denied = hit(&limited.router, "198.51.100.4").await;
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header(&denied, "x-ratelimit-remaining"), Some("0"));
    assert_eq!(header(&denied, "retry-after"), Some("60"));

    let other_client = hit(&limited.router, "198.51.100.5").await;
    assert_eq!(other_client.status(), StatusCode::OK);

    assert_eq!(limited.violations.len(), 1);
    assert_eq!(
        *limited
            .observer
            .identifiers
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
        vec!["198.51.100.4".to_owned()]
    );
}

#[tokio::test]
async fn window_slides_past_old_requests() {
    let limited = limited_router(2);

    for _ in 0..2 {
        assert_eq!(
            hit(&limited.router, "198.51.100.4").await.status(),
            StatusCode::OK
        );
    }
    assert_eq!(
        hit(&limited.router, "198.51.100.4").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );

    limited.clock.advance(TimeDelta::milliseconds(60_001));

    assert_eq!(
        hit(&limited.router, "198.51.100.4").await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn require_admin_without_authentication_is_an_internal_error() {
    let router = Router::new()
        .route("/admin", get(|| async { "secret" }))
        .route_layer(from_fn(require_admin));
    let request = Request::builder()
        .uri("/admin")
        .body(Body::empty())
        .unwrap_or_else(|_| unreachable!());

    let response = router
        .oneshot(request)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
