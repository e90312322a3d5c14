use fleetgate_domain::RateLimitViolation;
use tracing::warn;

/// Receives every denied request, for alerting and bookkeeping only.
pub trait ViolationObserver: Send + Sync {
    /// Called once per denial.
    fn notify(&self, violation: &RateLimitViolation);
}

/// Logs violations at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingViolationObserver;

impl ViolationObserver for TracingViolationObserver {
    fn notify(&self, violation: &RateLimitViolation) {
        warn!(
            identifier = %violation.identifier,
            endpoint = %violation.endpoint,
            limit = violation.limit,
            window_ms = violation.window_ms,
            "rate limit exceeded"
        );
    }
}
