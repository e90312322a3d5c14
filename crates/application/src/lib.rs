//! Application services and ports.

#![forbid(unsafe_code)]

mod auth_ports;
mod cache_service;
mod cache_warmer;
mod clock;
mod rate_limit_service;
mod store_connector;
mod store_ports;
#[cfg(test)]
mod test_support;
mod violation_log;

pub use auth_ports::TokenVerifier;
pub use cache_service::{CacheInvalidator, CacheService};
pub use cache_warmer::{CacheWarmer, WarmingOptions, WarmingSource, WarmingTask};
pub use clock::{Clock, ManualClock, SystemClock};
pub use rate_limit_service::{
    IP_SCOPE, RateLimitConfig, RateLimitPolicies, RateLimitService, TracingViolationObserver,
    USER_SCOPE, ViolationObserver, scale,
};
pub use store_connector::{RetryPolicy, StoreConnector};
pub use store_ports::{KeyValueStore, ScanPage, StoreFactory, WindowHit};
pub use violation_log::{DEFAULT_VIOLATION_CAPACITY, ViolationLog};
