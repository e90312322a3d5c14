use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::KeyPattern;

use crate::{
    Clock, KeyValueStore, ManualClock, RetryPolicy, ScanPage, StoreConnector, StoreFactory,
    WindowHit,
};

const SCAN_PAGE_SIZE: usize = 2;

pub(crate) fn start_instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

pub(crate) fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(start_instant()))
}

pub(crate) fn fast_retry_policy() -> RetryPolicy {
    RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(4))
}

enum FakeValue {
    Text(String),
    Window(Vec<(i64, String)>),
}

struct FakeEntry {
    value: FakeValue,
    expires_at_ms: Option<i64>,
}

/// Map-backed store that pages scans two keys at a time.
///
/// Scans never purge, so expired keys keep their slot until a later write.
pub(crate) struct FakeStore {
    clock: Arc<ManualClock>,
    entries: Mutex<BTreeMap<String, FakeEntry>>,
    failing: AtomicBool,
}

impl FakeStore {
    pub(crate) fn new(clock: Arc<ManualClock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(BTreeMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, now_ms);
        entries.keys().cloned().collect()
    }

    fn guard(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected failure".to_owned()));
        }

        Ok(())
    }

    fn expiry(&self, ttl_seconds: u64) -> Option<i64> {
        let ttl_ms = i64::try_from(ttl_seconds).unwrap_or(i64::MAX / 1000) * 1000;
        Some(self.clock.now_ms().saturating_add(ttl_ms))
    }
}

fn purge_expired(entries: &mut BTreeMap<String, FakeEntry>, now_ms: i64) {
    entries.retain(|_, entry| entry.expires_at_ms.is_none_or(|expires| expires > now_ms));
}

fn wrong_type(key: &str) -> AppError {
    AppError::Store(format!("wrong type for key '{key}'"))
}

#[async_trait]
impl KeyValueStore for FakeStore {
    async fn ping(&self) -> AppResult<()> {
        self.guard()
    }

    async fn record_window_hit(&self, hit: &WindowHit) -> AppResult<u64> {
        self.guard()?;
        let expires_at_ms = self.expiry(hit.ttl_seconds);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());

        let entry = entries.entry(hit.key.clone()).or_insert(FakeEntry {
            value: FakeValue::Window(Vec::new()),
            expires_at_ms: None,
        });
        let FakeValue::Window(window) = &mut entry.value else {
            return Err(wrong_type(hit.key.as_str()));
        };

        window.retain(|(score, _)| *score >= hit.window_start_ms);
        window.push((hit.entry.timestamp_ms, hit.entry.member.clone()));
        let count = window.len();
        entry.expires_at_ms = expires_at_ms;

        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn count_window(&self, key: &str, window_start_ms: i64) -> AppResult<u64> {
        self.guard()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());

        match entries.get_mut(key).map(|entry| &mut entry.value) {
            None => Ok(0),
            Some(FakeValue::Window(window)) => {
                window.retain(|(score, _)| *score >= window_start_ms);
                Ok(u64::try_from(window.len()).unwrap_or(u64::MAX))
            }
            Some(FakeValue::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn oldest_window_entry(&self, key: &str) -> AppResult<Option<i64>> {
        self.guard()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());

        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(FakeValue::Window(window)) => Ok(window.iter().map(|(score, _)| *score).min()),
            Some(FakeValue::Text(_)) => Err(wrong_type(key)),
        }
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.guard()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());

        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(None),
            Some(FakeValue::Text(value)) => Ok(Some(value.clone())),
            Some(FakeValue::Window(_)) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> AppResult<()> {
        self.guard()?;
        let expires_at_ms = ttl_seconds.and_then(|ttl| self.expiry(ttl));
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(
            key.to_owned(),
            FakeEntry {
                value: FakeValue::Text(value.to_owned()),
                expires_at_ms,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> AppResult<u64> {
        self.guard()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());

        let removed = keys
            .iter()
            .filter(|key| entries.remove(key.as_str()).is_some())
            .count();
        Ok(u64::try_from(removed).unwrap_or(u64::MAX))
    }

    async fn scan(&self, cursor: u64, pattern: &str, _count: usize) -> AppResult<ScanPage> {
        self.guard()?;
        let glob = KeyPattern::new(pattern)?;
        let now_ms = self.clock.now_ms();
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let end = start.saturating_add(SCAN_PAGE_SIZE);
        let keys = entries
            .iter()
            .skip(start)
            .take(SCAN_PAGE_SIZE)
            .filter(|(key, entry)| {
                entry.expires_at_ms.is_none_or(|expires| expires > now_ms)
                    && glob.matches(key.as_str())
            })
            .map(|(key, _)| key.clone())
            .collect();
        let next_cursor = if end < entries.len() {
            u64::try_from(end).unwrap_or(0)
        } else {
            0
        };

        Ok(ScanPage { next_cursor, keys })
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.guard()?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, self.clock.now_ms());
        Ok(entries.contains_key(key))
    }

    async fn ttl(&self, key: &str) -> AppResult<i64> {
        self.guard()?;
        let now_ms = self.clock.now_ms();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        purge_expired(&mut entries, now_ms);

        Ok(match entries.get(key) {
            None => -2,
            Some(FakeEntry {
                expires_at_ms: None,
                ..
            }) => -1,
            Some(FakeEntry {
                expires_at_ms: Some(expires),
                ..
            }) => (expires - now_ms + 999) / 1000,
        })
    }
}

/// Scripted factory outcome.
#[derive(Debug, Clone, Copy)]
pub(crate) enum FactoryOutcome {
    Connect,
    Disabled,
    Fail,
}

/// Factory replaying scripted outcomes, then connecting.
pub(crate) struct FakeFactory {
    store: Arc<FakeStore>,
    outcomes: Mutex<VecDeque<FactoryOutcome>>,
    calls: AtomicUsize,
}

impl FakeFactory {
    pub(crate) fn new(store: Arc<FakeStore>, outcomes: Vec<FactoryOutcome>) -> Self {
        Self {
            store,
            outcomes: Mutex::new(outcomes.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreFactory for FakeFactory {
    async fn connect(&self) -> AppResult<Option<Arc<dyn KeyValueStore>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(FactoryOutcome::Connect);

        match outcome {
            FactoryOutcome::Connect => {
                let store: Arc<dyn KeyValueStore> = self.store.clone();
                Ok(Some(store))
            }
            FactoryOutcome::Disabled => Ok(None),
            FactoryOutcome::Fail => Err(AppError::Store("connection refused".to_owned())),
        }
    }
}

/// Connector that connects to `store` on first use.
pub(crate) fn connected(store: Arc<FakeStore>) -> StoreConnector {
    StoreConnector::new(
        Arc::new(FakeFactory::new(store, Vec::new())),
        fast_retry_policy(),
    )
}

/// Connector whose factory reports the store as disabled.
pub(crate) fn disabled(store: Arc<FakeStore>) -> StoreConnector {
    let outcomes = vec![FactoryOutcome::Disabled];
    StoreConnector::new(
        Arc::new(FakeFactory::new(store, outcomes)),
        fast_retry_policy(),
    )
}
