//! Sliding-window rate limit value types.
//!
//! A window is an ordered set of `(timestamp, member)` entries per identifier.
//! Entries older than `now - window` are pruned before every count, so the
//! count always reflects the continuously moving interval ending at `now`.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one rate limit check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitResult {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Maximum number of requests in the window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// Instant at which a full quota is guaranteed again.
    pub reset_at: DateTime<Utc>,
    /// Seconds to wait before retrying, only set on denial.
    pub retry_after_seconds: Option<u64>,
}

impl RateLimitResult {
    /// Builds a result from the number of entries counted in the window.
    ///
    /// The boundary is inclusive: `count == limit` is still allowed.
    #[must_use]
    pub fn from_count(limit: u32, count: u64, reset_at: DateTime<Utc>) -> Self {
        let remaining = u64::from(limit).saturating_sub(count);

        Self {
            allowed: count <= u64::from(limit),
            limit,
            remaining: u32::try_from(remaining).unwrap_or(limit),
            reset_at,
            retry_after_seconds: None,
        }
    }

    /// Builds the permissive result used when the store cannot be consulted.
    #[must_use]
    pub fn fail_open(limit: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            allowed: true,
            limit,
            remaining: limit,
            reset_at,
            retry_after_seconds: None,
        }
    }

    /// Attaches a retry-after hint.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after_seconds: u64) -> Self {
        self.retry_after_seconds = Some(retry_after_seconds);
        self
    }

    /// Standard rate limit response headers for this result.
    ///
    /// `Retry-After` is only present on denial.
    #[must_use]
    pub fn headers(&self) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_LIMIT.to_owned(), self.limit.to_string());
        headers.insert(HEADER_REMAINING.to_owned(), self.remaining.to_string());
        headers.insert(
            HEADER_RESET.to_owned(),
            self.reset_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        if let Some(retry_after) = self.retry_after_seconds {
            headers.insert(HEADER_RETRY_AFTER.to_owned(), retry_after.to_string());
        }

        headers
    }
}

/// Header carrying the policy limit.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Header carrying the remaining quota.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Header carrying the reset instant.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";
/// Header carrying the retry hint on denial.
pub const HEADER_RETRY_AFTER: &str = "Retry-After";

/// One request recorded in a sliding window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindowEntry {
    /// Request time in Unix milliseconds, used as the sort score.
    pub timestamp_ms: i64,
    /// Unique member so same-millisecond requests never overwrite each other.
    pub member: String,
}

impl RateWindowEntry {
    /// Creates an entry with a collision-resistant member id.
    #[must_use]
    pub fn new(timestamp_ms: i64) -> Self {
        Self {
            timestamp_ms,
            member: format!("{timestamp_ms}-{}", Uuid::new_v4().simple()),
        }
    }
}

/// Record of one denied request, kept for operational visibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitViolation {
    /// When the denial happened.
    pub timestamp: DateTime<Utc>,
    /// Identifier that exceeded its quota (IP or user id).
    pub identifier: String,
    /// Endpoint or policy namespace that denied the request.
    pub endpoint: String,
    /// Limit in force.
    pub limit: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
    /// Rate limit headers sent with the denial.
    pub headers: BTreeMap<String, String>,
}

/// Window length rounded up to whole seconds.
#[must_use]
pub fn window_seconds(window_ms: u64) -> u64 {
    window_ms.div_ceil(1000)
}

/// Seconds until the oldest entry leaves the window.
///
/// Clamped to `1..=window_seconds(window_ms)` so a denial always carries a
/// positive hint that never exceeds the window itself.
#[must_use]
pub fn retry_after_seconds(oldest_timestamp_ms: i64, window_ms: u64, now_ms: i64) -> u64 {
    let ceiling = window_seconds(window_ms).max(1);
    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    let until_expiry_ms = oldest_timestamp_ms
        .saturating_add(window)
        .saturating_sub(now_ms);

    if until_expiry_ms <= 0 {
        return 1;
    }

    let seconds = u64::try_from(until_expiry_ms)
        .unwrap_or(u64::MAX)
        .div_ceil(1000);
    seconds.clamp(1, ceiling)
}
