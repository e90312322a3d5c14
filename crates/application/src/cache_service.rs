//! Value-agnostic cache over the shared store.
//!
//! Every operation recovers from store failures locally and returns the safe
//! default for its type, so callers never have to tell a miss from an outage.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use fleetgate_core::AppResult;
use fleetgate_domain::{cache_key, tag_pattern};

use crate::store_connector::StoreConnector;

mod invalidation;

#[cfg(test)]
mod tests;

pub use invalidation::CacheInvalidator;

const SCAN_BATCH_SIZE: usize = 100;

/// Application service for JSON values cached in the store.
#[derive(Clone)]
pub struct CacheService {
    connector: StoreConnector,
}

impl CacheService {
    /// Creates a new cache service.
    #[must_use]
    pub fn new(connector: StoreConnector) -> Self {
        Self { connector }
    }

    /// Reads and decodes a value; `None` on miss or any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store = self.connector.connection().await?;

        match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(raw.as_str()) {
                Ok(value) => {
                    debug!(key, "cache hit");
                    Some(value)
                }
                Err(error) => {
                    warn!(key, error = %error, "failed to decode cached value");
                    None
                }
            },
            Ok(None) => {
                debug!(key, "cache miss");
                None
            }
            Err(error) => {
                warn!(key, error = %error, "cache read failed");
                None
            }
        }
    }

    /// Encodes and stores a value, with the TTL applied in the same write.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: Option<u64>,
    ) -> bool {
        let Some(store) = self.connector.connection().await else {
            return false;
        };

        let encoded = match serde_json::to_string(value) {
            Ok(encoded) => encoded,
            Err(error) => {
                warn!(key, error = %error, "failed to encode cache value");
                return false;
            }
        };

        match store.set(key, encoded.as_str(), ttl_seconds).await {
            Ok(()) => true,
            Err(error) => {
                warn!(key, error = %error, "cache write failed");
                false
            }
        }
    }

    /// Removes one key; `true` once the store has acknowledged the delete.
    pub async fn delete(&self, key: &str) -> bool {
        let Some(store) = self.connector.connection().await else {
            return false;
        };

        match store.delete(&[key.to_owned()]).await {
            Ok(_) => true,
            Err(error) => {
                warn!(key, error = %error, "cache delete failed");
                false
            }
        }
    }

    /// Removes every key matching the glob and returns how many were removed.
    ///
    /// All scan rounds complete before a single batched delete is issued.
    pub async fn invalidate(&self, pattern: &str) -> u64 {
        let Some(store) = self.connector.connection().await else {
            return 0;
        };

        let mut matched: Vec<String> = Vec::new();
        let mut cursor = 0;
        loop {
            let page = match store.scan(cursor, pattern, SCAN_BATCH_SIZE).await {
                Ok(page) => page,
                Err(error) => {
                    warn!(pattern, error = %error, "cache scan failed");
                    return 0;
                }
            };

            matched.extend(page.keys);
            cursor = page.next_cursor;
            if cursor == 0 {
                break;
            }
        }

        matched.sort_unstable();
        matched.dedup();
        if matched.is_empty() {
            return 0;
        }

        match store.delete(matched.as_slice()).await {
            Ok(removed) => {
                debug!(pattern, removed, "cache entries invalidated");
                removed
            }
            Err(error) => {
                warn!(pattern, error = %error, "cache invalidation failed");
                0
            }
        }
    }

    /// Invalidates `*:<tag>:*` for each tag and sums the removed counts.
    pub async fn invalidate_by_tags(&self, tags: &[&str]) -> u64 {
        let mut removed = 0;
        for tag in tags {
            removed += self.invalidate(tag_pattern(tag).as_str()).await;
        }

        removed
    }

    /// Returns whether the key exists; `false` on failure.
    pub async fn exists(&self, key: &str) -> bool {
        let Some(store) = self.connector.connection().await else {
            return false;
        };

        store.exists(key).await.unwrap_or_else(|error| {
            warn!(key, error = %error, "cache exists check failed");
            false
        })
    }

    /// Remaining TTL in seconds as reported by the store; `-1` on failure.
    pub async fn ttl(&self, key: &str) -> i64 {
        let Some(store) = self.connector.connection().await else {
            return -1;
        };

        store.ttl(key).await.unwrap_or_else(|error| {
            warn!(key, error = %error, "cache ttl lookup failed");
            -1
        })
    }

    /// Composes `prefix + parts.join(":")`.
    #[must_use]
    pub fn generate_key(prefix: &str, parts: &[&str]) -> String {
        cache_key(prefix, parts)
    }

    /// Serves a cached value or loads, caches and returns a fresh one.
    ///
    /// Loader errors propagate; cache failures never do.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        key: &str,
        ttl_seconds: Option<u64>,
        loader: F,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let value = loader().await?;
        if !self.set(key, &value, ttl_seconds).await {
            debug!(key, "loaded value not cached");
        }
        Ok(value)
    }

    /// Returns whether a store client is currently available.
    pub async fn is_available(&self) -> bool {
        self.connector.connection().await.is_some()
    }
}
