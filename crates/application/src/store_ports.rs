use std::sync::Arc;

use async_trait::async_trait;

use fleetgate_core::AppResult;
use fleetgate_domain::RateWindowEntry;

/// One sliding-window write: prune, insert, count and refresh expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowHit {
    /// Sorted set holding the window.
    pub key: String,
    /// Entries scored strictly below this are pruned.
    pub window_start_ms: i64,
    /// Entry to insert.
    pub entry: RateWindowEntry,
    /// Expiry applied to the whole set.
    pub ttl_seconds: u64,
}

/// One page of a cursor-based key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next round; `0` ends the iteration.
    pub next_cursor: u64,
    /// Keys matched in this round.
    pub keys: Vec<String>,
}

/// Shared key-value store with per-key TTL and atomic sorted-set batches.
///
/// Every call is expected to be bounded by an adapter-level timeout and to
/// surface failures as `AppError::Store`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Liveness check.
    async fn ping(&self) -> AppResult<()>;

    /// Applies the window write as one atomic batch and returns the count
    /// observed after insertion.
    async fn record_window_hit(&self, hit: &WindowHit) -> AppResult<u64>;

    /// Prunes entries below `window_start_ms` and counts what remains,
    /// without inserting.
    async fn count_window(&self, key: &str, window_start_ms: i64) -> AppResult<u64>;

    /// Returns the lowest score in the window, if any.
    async fn oldest_window_entry(&self, key: &str) -> AppResult<Option<i64>>;

    /// Reads a string value.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Writes a string value; the TTL is applied in the same command.
    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> AppResult<()>;

    /// Deletes keys and returns how many existed.
    async fn delete(&self, keys: &[String]) -> AppResult<u64>;

    /// Runs one scan round over keys matching the glob.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> AppResult<ScanPage>;

    /// Returns whether the key exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Remaining TTL in seconds: `-2` when missing, `-1` without expiry.
    async fn ttl(&self, key: &str) -> AppResult<i64>;
}

/// Builds store clients from configuration.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Connects to the store.
    ///
    /// `Ok(None)` means the store is deliberately disabled, e.g. missing or
    /// insecure credentials. `Err` is a construction failure worth retrying.
    async fn connect(&self) -> AppResult<Option<Arc<dyn KeyValueStore>>>;
}
