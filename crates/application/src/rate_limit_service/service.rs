use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};

use fleetgate_domain::{
    RateLimitResult, RateLimitViolation, RateWindowEntry, retry_after_seconds, window_seconds,
};

use crate::clock::Clock;
use crate::store_connector::StoreConnector;
use crate::store_ports::WindowHit;

use super::config::RateLimitConfig;

/// Application service for sliding-window rate limiting.
#[derive(Clone)]
pub struct RateLimitService {
    connector: StoreConnector,
    clock: Arc<dyn Clock>,
}

impl RateLimitService {
    /// Creates a new rate limit service.
    #[must_use]
    pub fn new(connector: StoreConnector, clock: Arc<dyn Clock>) -> Self {
        Self { connector, clock }
    }

    /// Records a request for `identifier` and decides whether it may proceed.
    ///
    /// Never fails: an unavailable store or any store error yields an
    /// allowed result with the full quota.
    pub async fn check_limit(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitResult {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();
        let window_ms = config.window_ms();
        let reset_at = reset_instant(now, window_ms);

        let Some(store) = self.connector.connection().await else {
            debug!(
                namespace = config.key_namespace(),
                "store unavailable; rate limit check skipped"
            );
            return RateLimitResult::fail_open(config.max(), reset_at);
        };

        let key = config.key_for(identifier);
        let hit = WindowHit {
            key: key.clone(),
            window_start_ms: window_start(now_ms, window_ms),
            entry: RateWindowEntry::new(now_ms),
            ttl_seconds: config.window_ttl_seconds(),
        };

        let count = match store.record_window_hit(&hit).await {
            Ok(count) => count,
            Err(error) => {
                warn!(key = %key, error = %error, "rate limit check failed; failing open");
                return RateLimitResult::fail_open(config.max(), reset_at);
            }
        };

        let result = RateLimitResult::from_count(config.max(), count, reset_at);
        if result.allowed {
            return result;
        }

        let retry_after = match store.oldest_window_entry(key.as_str()).await {
            Ok(Some(oldest_ms)) => retry_after_seconds(oldest_ms, window_ms, now_ms),
            Ok(None) => window_seconds(window_ms).max(1),
            Err(error) => {
                warn!(key = %key, error = %error, "failed to read oldest window entry");
                window_seconds(window_ms).max(1)
            }
        };
        let result = result.with_retry_after(retry_after);

        if !config.observers().is_empty() {
            let violation = RateLimitViolation {
                timestamp: now,
                identifier: identifier.to_owned(),
                endpoint: config.key_namespace().to_owned(),
                limit: config.max(),
                window_ms,
                headers: result.headers(),
            };
            for observer in config.observers() {
                observer.notify(&violation);
            }
        }

        result
    }

    /// Clears the window of `identifier`; `false` when the store cannot be
    /// reached.
    pub async fn reset(&self, identifier: &str, config: &RateLimitConfig) -> bool {
        let Some(store) = self.connector.connection().await else {
            return false;
        };

        let key = config.key_for(identifier);
        match store.delete(&[key.clone()]).await {
            Ok(_) => true,
            Err(error) => {
                warn!(key = %key, error = %error, "failed to reset rate limit window");
                false
            }
        }
    }

    /// Requests left for `identifier` without recording one.
    pub async fn get_remaining(&self, identifier: &str, config: &RateLimitConfig) -> u32 {
        let Some(store) = self.connector.connection().await else {
            return config.max();
        };

        let now_ms = self.clock.now_ms();
        let key = config.key_for(identifier);
        match store
            .count_window(key.as_str(), window_start(now_ms, config.window_ms()))
            .await
        {
            Ok(count) => RateLimitResult::from_count(config.max(), count, self.clock.now()).remaining,
            Err(error) => {
                warn!(key = %key, error = %error, "failed to count rate limit window");
                config.max()
            }
        }
    }

    /// Returns whether checks are currently enforced against the store.
    pub async fn is_available(&self) -> bool {
        self.connector.connection().await.is_some() && self.connector.is_healthy()
    }
}

fn window_start(now_ms: i64, window_ms: u64) -> i64 {
    now_ms.saturating_sub(i64::try_from(window_ms).unwrap_or(i64::MAX))
}

fn reset_instant(now: DateTime<Utc>, window_ms: u64) -> DateTime<Utc> {
    TimeDelta::try_milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX))
        .and_then(|window| now.checked_add_signed(window))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
