use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use fleetgate_application::{Clock, KeyValueStore, ScanPage, StoreFactory, WindowHit};
use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::KeyPattern;
use tokio::sync::{Mutex, RwLock};

#[cfg(test)]
mod tests;

const MAX_OPEN_CURSORS: usize = 1024;

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Window(Vec<(i64, String)>),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: StoredValue,
    expires_at_ms: Option<i64>,
}

impl StoredEntry {
    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms.is_none_or(|expires| expires > now_ms)
    }
}

/// Process-local key-value store for development and tests.
///
/// Expiry is evaluated against the injected clock on every access. Scan
/// cursors are opaque handles that resume after the last key a round
/// visited, so keys expiring or deleted between rounds never hide others.
pub struct InMemoryKeyValueStore {
    clock: Arc<dyn Clock>,
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    cursors: Mutex<ScanCursors>,
}

/// Open scan cursors keyed by id; the oldest is dropped past the cap.
#[derive(Default)]
struct ScanCursors {
    last_id: u64,
    open: BTreeMap<u64, String>,
}

impl ScanCursors {
    fn register(&mut self, resume_after: String) -> u64 {
        self.last_id = self.last_id.wrapping_add(1).max(1);
        if self.open.len() >= MAX_OPEN_CURSORS {
            self.open.pop_first();
        }
        self.open.insert(self.last_id, resume_after);
        self.last_id
    }
}

impl InMemoryKeyValueStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: RwLock::new(BTreeMap::new()),
            cursors: Mutex::new(ScanCursors::default()),
        }
    }

    fn expiry(&self, ttl_seconds: u64) -> i64 {
        let ttl_ms = i64::try_from(ttl_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        self.clock.now_ms().saturating_add(ttl_ms)
    }

    async fn purged(&self) -> tokio::sync::RwLockWriteGuard<'_, BTreeMap<String, StoredEntry>> {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.is_live(now_ms));
        entries
    }
}

fn wrong_type(key: &str) -> AppError {
    AppError::Store(format!(
        "operation against key '{key}' holding the wrong kind of value"
    ))
}

fn count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn record_window_hit(&self, hit: &WindowHit) -> AppResult<u64> {
        let expires_at_ms = self.expiry(hit.ttl_seconds);
        let mut entries = self.purged().await;

        let entry = entries.entry(hit.key.clone()).or_insert(StoredEntry {
            value: StoredValue::Window(Vec::new()),
            expires_at_ms: None,
        });
        let StoredValue::Window(window) = &mut entry.value else {
            return Err(wrong_type(hit.key.as_str()));
        };

        window.retain(|(score, _)| *score >= hit.window_start_ms);
        window.push((hit.entry.timestamp_ms, hit.entry.member.clone()));
        let hits = window.len();
        entry.expires_at_ms = Some(expires_at_ms);

        Ok(count(hits))
    }

    async fn count_window(&self, key: &str, window_start_ms: i64) -> AppResult<u64> {
        let mut entries = self.purged().await;

        match entries.get_mut(key).map(|entry| &mut entry.value) {
            None => Ok(0),
            Some(StoredValue::Window(window)) => {
                window.retain(|(score, _)| *score >= window_start_ms);
                Ok(count(window.len()))
            }
            Some(StoredValue::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn oldest_window_entry(&self, key: &str) -> AppResult<Option<i64>> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;

        match entries.get(key).filter(|entry| entry.is_live(now_ms)) {
            None => Ok(None),
            Some(StoredEntry {
                value: StoredValue::Window(window),
                ..
            }) => Ok(window.iter().map(|(score, _)| *score).min()),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;

        match entries.get(key).filter(|entry| entry.is_live(now_ms)) {
            None => Ok(None),
            Some(StoredEntry {
                value: StoredValue::Text(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> AppResult<()> {
        let expires_at_ms = ttl_seconds.map(|ttl| self.expiry(ttl.max(1)));
        self.entries.write().await.insert(
            key.to_owned(),
            StoredEntry {
                value: StoredValue::Text(value.to_owned()),
                expires_at_ms,
            },
        );

        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<u64> {
        let mut entries = self.purged().await;
        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();

        Ok(count(removed))
    }

    async fn scan(&self, cursor: u64, pattern: &str, batch: usize) -> AppResult<ScanPage> {
        let glob = KeyPattern::new(pattern)?;
        let resume_after = match cursor {
            0 => None,
            id => Some(
                self.cursors
                    .lock()
                    .await
                    .open
                    .remove(&id)
                    .ok_or_else(|| AppError::Store(format!("unknown scan cursor {id}")))?,
            ),
        };

        let now_ms = self.clock.now_ms();
        let batch = batch.max(1);
        let (keys, next_start) = {
            let entries = self.entries.read().await;
            let lower = resume_after
                .as_deref()
                .map_or(Bound::Unbounded, Bound::Excluded);
            let mut remaining = entries.range::<str, _>((lower, Bound::Unbounded));

            let mut keys = Vec::new();
            let mut last_visited = None;
            for (key, entry) in remaining.by_ref().take(batch) {
                if entry.is_live(now_ms) && glob.matches(key.as_str()) {
                    keys.push(key.clone());
                }
                last_visited = Some(key.clone());
            }

            let next_start = remaining.next().and(last_visited);
            (keys, next_start)
        };

        let next_cursor = match next_start {
            Some(last) => self.cursors.lock().await.register(last),
            None => 0,
        };

        Ok(ScanPage { next_cursor, keys })
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let now_ms = self.clock.now_ms();
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .is_some_and(|entry| entry.is_live(now_ms)))
    }

    async fn ttl(&self, key: &str) -> AppResult<i64> {
        let now_ms = self.clock.now_ms();
        let entries = self.entries.read().await;

        Ok(
            match entries.get(key).filter(|entry| entry.is_live(now_ms)) {
                None => -2,
                Some(entry) => entry
                    .expires_at_ms
                    .map_or(-1, |expires| (expires - now_ms + 999) / 1000),
            },
        )
    }
}

/// Factory handing out one shared in-memory store.
#[derive(Clone)]
pub struct InMemoryStoreFactory {
    store: Arc<InMemoryKeyValueStore>,
}

impl InMemoryStoreFactory {
    /// Creates a factory around a fresh store.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(InMemoryKeyValueStore::new(clock)),
        }
    }

    /// Returns the store every connection resolves to.
    #[must_use]
    pub fn store(&self) -> Arc<InMemoryKeyValueStore> {
        Arc::clone(&self.store)
    }
}

#[async_trait]
impl StoreFactory for InMemoryStoreFactory {
    async fn connect(&self) -> AppResult<Option<Arc<dyn KeyValueStore>>> {
        let store: Arc<dyn KeyValueStore> = self.store.clone();
        Ok(Some(store))
    }
}
