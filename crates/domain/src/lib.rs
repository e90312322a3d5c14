//! Domain value types for request gating and caching.

#![forbid(unsafe_code)]

mod cache;
mod fleet;
mod key_pattern;
mod rate_limit;
mod warming;

pub use cache::{CacheCatalog, CacheConfig, cache_key, events, tag_pattern};
pub use fleet::{Booking, Car, DayAvailability};
pub use key_pattern::KeyPattern;
pub use rate_limit::{
    HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET, HEADER_RETRY_AFTER, RateLimitResult,
    RateLimitViolation, RateWindowEntry, retry_after_seconds, window_seconds,
};
pub use warming::{CacheWarmingMetrics, WarmingStatus};
