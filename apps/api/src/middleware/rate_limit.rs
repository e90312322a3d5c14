use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::{Next, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use fleetgate_application::{
    Clock, IP_SCOPE, RateLimitConfig, RateLimitService, USER_SCOPE, ViolationLog,
    ViolationObserver,
};
use fleetgate_core::AppError;
use fleetgate_domain::{RateLimitResult, RateLimitViolation};
use tracing::debug;

use crate::error::ApiError;

use super::client_ip::client_ip_identifier;
use super::identity::IdentityResolver;

/// Extracts the identifier a request is counted under.
pub type IdentifierFn = fn(&Request) -> String;

/// User-scoped second check of a dual limit.
#[derive(Clone)]
pub struct DualLimit {
    pub user_config: RateLimitConfig,
    pub identity: IdentityResolver,
}

/// Per-route rate limit settings.
#[derive(Clone)]
pub struct RateLimitOptions {
    pub config: RateLimitConfig,
    pub identifier: IdentifierFn,
    pub dual_limit: Option<DualLimit>,
    pub on_rate_limited: Vec<Arc<dyn ViolationObserver>>,
}

impl RateLimitOptions {
    /// Limits by client IP under `config`.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            identifier: client_ip_identifier,
            dual_limit: None,
            on_rate_limited: Vec::new(),
        }
    }

    pub fn with_dual_limit(
        mut self,
        user_config: RateLimitConfig,
        identity: IdentityResolver,
    ) -> Self {
        self.dual_limit = Some(DualLimit {
            user_config,
            identity,
        });
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.on_rate_limited.push(observer);
        self
    }
}

/// State of one `enforce_rate_limit` route layer.
#[derive(Clone)]
pub struct RateLimitLayer {
    service: RateLimitService,
    violations: Arc<ViolationLog>,
    clock: Arc<dyn Clock>,
    options: Arc<RateLimitOptions>,
}

impl RateLimitLayer {
    pub fn new(
        service: RateLimitService,
        violations: Arc<ViolationLog>,
        clock: Arc<dyn Clock>,
        options: RateLimitOptions,
    ) -> Self {
        Self {
            service,
            violations,
            clock,
            options: Arc::new(options),
        }
    }
}

/// Wraps every route of `routes` with the limiter.
pub fn with_rate_limit<S>(routes: Router<S>, layer: RateLimitLayer) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes.route_layer(from_fn_with_state(layer, enforce_rate_limit))
}

struct Decision {
    result: RateLimitResult,
    identifier: String,
    config: RateLimitConfig,
}

async fn decide(layer: &RateLimitLayer, ip: String, headers: &HeaderMap) -> Decision {
    let options = layer.options.as_ref();

    let dual = options
        .dual_limit
        .as_ref()
        .filter(|_| options.config.dual_limit_enabled());
    let Some(dual) = dual else {
        let result = layer.service.check_limit(ip.as_str(), &options.config).await;
        return Decision {
            result,
            identifier: ip,
            config: options.config.clone(),
        };
    };

    let ip_config = options.config.scoped(IP_SCOPE);
    let ip_result = layer.service.check_limit(ip.as_str(), &ip_config).await;
    let ip_decision = Decision {
        result: ip_result,
        identifier: ip,
        config: ip_config,
    };
    if !ip_decision.result.allowed {
        return ip_decision;
    }

    match dual.identity.user_id_from_headers(headers).await {
        Some(user_id) => {
            let user_config = dual.user_config.scoped(USER_SCOPE);
            let result = layer.service.check_limit(user_id.as_str(), &user_config).await;
            Decision {
                result,
                identifier: user_id,
                config: user_config,
            }
        }
        None => ip_decision,
    }
}

async fn enforce_rate_limit(
    State(layer): State<RateLimitLayer>,
    request: Request,
    next: Next,
) -> Response {
    let ip = (layer.options.identifier)(&request);
    let decision = decide(&layer, ip, request.headers()).await;
    let headers = decision.result.headers();

    if decision.result.allowed {
        let mut response = next.run(request).await;
        apply_headers(response.headers_mut(), &headers);
        return response;
    }

    let retry_after_seconds = decision.result.retry_after_seconds.unwrap_or(1);
    let violation = RateLimitViolation {
        timestamp: layer.clock.now(),
        identifier: decision.identifier,
        endpoint: request.uri().path().to_owned(),
        limit: decision.config.max(),
        window_ms: decision.config.window_ms(),
        headers: headers.clone(),
    };
    debug!(
        namespace = decision.config.key_namespace(),
        retry_after_seconds,
        "request rejected by rate limit"
    );
    for observer in &layer.options.on_rate_limited {
        observer.notify(&violation);
    }
    layer.violations.record(violation);

    let mut response = ApiError(AppError::RateLimited {
        message: format!("too many requests, retry in {retry_after_seconds}s"),
        retry_after_seconds,
    })
    .into_response();
    apply_headers(response.headers_mut(), &headers);
    response
}

fn apply_headers(target: &mut HeaderMap, headers: &BTreeMap<String, String>) {
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value.as_str()),
        ) else {
            continue;
        };
        target.insert(name, value);
    }
}
