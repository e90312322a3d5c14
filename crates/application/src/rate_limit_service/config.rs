use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use fleetgate_core::{AppError, AppResult, NonEmptyString};
use fleetgate_domain::window_seconds;

use super::observer::ViolationObserver;

/// Sub-namespace of the IP-scoped half of a dual limit.
pub const IP_SCOPE: &str = "ip";
/// Sub-namespace of the user-scoped half of a dual limit.
pub const USER_SCOPE: &str = "user";

/// One rate limit policy, e.g. ten payment attempts per five minutes.
#[derive(Clone)]
pub struct RateLimitConfig {
    window: Duration,
    max: u32,
    key_namespace: NonEmptyString,
    dual_limit_enabled: bool,
    observers: Vec<Arc<dyn ViolationObserver>>,
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RateLimitConfig")
            .field("window", &self.window)
            .field("max", &self.max)
            .field("key_namespace", &self.key_namespace)
            .field("dual_limit_enabled", &self.dual_limit_enabled)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl RateLimitConfig {
    /// Creates a validated policy.
    pub fn new(window: Duration, max: u32, key_namespace: impl Into<String>) -> AppResult<Self> {
        if max == 0 {
            return Err(AppError::Validation(
                "rate limit max must be greater than zero".to_owned(),
            ));
        }
        if window.as_millis() == 0 {
            return Err(AppError::Validation(
                "rate limit window must be at least one millisecond".to_owned(),
            ));
        }

        Ok(Self {
            window,
            max,
            key_namespace: NonEmptyString::new(key_namespace)?,
            dual_limit_enabled: false,
            observers: Vec::new(),
        })
    }

    /// Enables the IP-then-user dual check in the request layer.
    #[must_use]
    pub fn with_dual_limit(mut self) -> Self {
        self.dual_limit_enabled = true;
        self
    }

    /// Adds an observer notified on every denial.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Returns the window length.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns the window length in milliseconds.
    #[must_use]
    pub fn window_ms(&self) -> u64 {
        u64::try_from(self.window.as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns the expiry applied to the window set.
    #[must_use]
    pub fn window_ttl_seconds(&self) -> u64 {
        window_seconds(self.window_ms())
    }

    /// Returns the maximum number of requests per window.
    #[must_use]
    pub fn max(&self) -> u32 {
        self.max
    }

    /// Returns the key namespace.
    #[must_use]
    pub fn key_namespace(&self) -> &str {
        self.key_namespace.as_str()
    }

    /// Returns whether dual limiting is enabled.
    #[must_use]
    pub fn dual_limit_enabled(&self) -> bool {
        self.dual_limit_enabled
    }

    /// Returns the configured observers.
    #[must_use]
    pub fn observers(&self) -> &[Arc<dyn ViolationObserver>] {
        self.observers.as_slice()
    }

    /// Store key of the window for `identifier`.
    #[must_use]
    pub fn key_for(&self, identifier: &str) -> String {
        format!("{}:{identifier}", self.key_namespace)
    }

    /// Same policy under the `{namespace}:{suffix}` sub-namespace.
    #[must_use]
    pub fn scoped(&self, suffix: &str) -> Self {
        let mut scoped = self.clone();
        if let Ok(namespace) = NonEmptyString::new(format!("{}:{suffix}", self.key_namespace)) {
            scoped.key_namespace = namespace;
        }
        scoped
    }
}

/// Scales a policy's `max` by `multiplier`, rounding up and never below one.
///
/// Non-finite or non-positive multipliers leave the policy unchanged.
#[must_use]
pub fn scale(config: &RateLimitConfig, multiplier: f64) -> RateLimitConfig {
    let mut scaled = config.clone();
    if !multiplier.is_finite() || multiplier <= 0.0 {
        return scaled;
    }

    let max = (f64::from(config.max) * multiplier).ceil();
    scaled.max = (max.min(f64::from(u32::MAX)) as u32).max(1);
    scaled
}

/// Built-in policies of the rental backend.
#[derive(Debug, Clone)]
pub struct RateLimitPolicies {
    /// General API traffic.
    pub api: RateLimitConfig,
    /// Sign-in and token endpoints.
    pub auth: RateLimitConfig,
    /// Booking creation, IP scope.
    pub booking: RateLimitConfig,
    /// Booking creation, user scope.
    pub booking_user: RateLimitConfig,
    /// Payment attempts, IP scope.
    pub payment: RateLimitConfig,
    /// Payment attempts, user scope.
    pub payment_user: RateLimitConfig,
    /// File uploads.
    pub upload: RateLimitConfig,
    /// Admin actions.
    pub admin: RateLimitConfig,
    /// Fleet and availability search.
    pub search: RateLimitConfig,
}

impl RateLimitPolicies {
    /// Returns the policies at their nominal limits.
    pub fn defaults() -> AppResult<Self> {
        const MINUTE: Duration = Duration::from_secs(60);
        const HOUR: Duration = Duration::from_secs(60 * 60);

        Ok(Self {
            api: RateLimitConfig::new(MINUTE, 100, "api")?,
            auth: RateLimitConfig::new(15 * MINUTE, 5, "auth")?,
            booking: RateLimitConfig::new(HOUR, 10, "booking")?.with_dual_limit(),
            booking_user: RateLimitConfig::new(HOUR, 5, "booking")?,
            payment: RateLimitConfig::new(5 * MINUTE, 10, "payment")?.with_dual_limit(),
            payment_user: RateLimitConfig::new(5 * MINUTE, 5, "payment")?,
            upload: RateLimitConfig::new(HOUR, 20, "upload")?,
            admin: RateLimitConfig::new(MINUTE, 30, "admin")?,
            search: RateLimitConfig::new(MINUTE, 60, "search")?,
        })
    }

    /// Returns every policy scaled by `multiplier`.
    pub fn scaled(multiplier: f64) -> AppResult<Self> {
        let defaults = Self::defaults()?;
        Ok(defaults.map(|config| scale(config, multiplier)))
    }

    /// Adds `observer` to every policy.
    #[must_use]
    pub fn with_observer(self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.map(|config| config.clone().with_observer(Arc::clone(&observer)))
    }

    /// Policies keyed the way the request layer keys them, with dual
    /// policies split into their IP and user scopes.
    #[must_use]
    pub fn effective(&self) -> Vec<(&'static str, RateLimitConfig)> {
        vec![
            ("api", self.api.clone()),
            ("auth", self.auth.clone()),
            ("booking:ip", self.booking.scoped(IP_SCOPE)),
            ("booking:user", self.booking_user.scoped(USER_SCOPE)),
            ("payment:ip", self.payment.scoped(IP_SCOPE)),
            ("payment:user", self.payment_user.scoped(USER_SCOPE)),
            ("upload", self.upload.clone()),
            ("admin", self.admin.clone()),
            ("search", self.search.clone()),
        ]
    }

    fn map(self, apply: impl Fn(&RateLimitConfig) -> RateLimitConfig) -> Self {
        Self {
            api: apply(&self.api),
            auth: apply(&self.auth),
            booking: apply(&self.booking),
            booking_user: apply(&self.booking_user),
            payment: apply(&self.payment),
            payment_user: apply(&self.payment_user),
            upload: apply(&self.upload),
            admin: apply(&self.admin),
            search: apply(&self.search),
        }
    }
}
