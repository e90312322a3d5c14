use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, TimeZone, Utc};
use fleetgate_application::{
    CacheService, KeyValueStore, ManualClock, RateLimitConfig, RateLimitService, RetryPolicy,
    StoreConnector, WindowHit,
};
use fleetgate_domain::RateWindowEntry;

use super::{InMemoryKeyValueStore, InMemoryStoreFactory};

fn clock() -> Arc<ManualClock> {
    let start = Utc
        .with_ymd_and_hms(2026, 10, 19, 8, 30, 0)
        .single()
        .unwrap_or_default();
    Arc::new(ManualClock::new(start))
}

fn hit(clock: &ManualClock, key: &str, window_ms: i64) -> WindowHit {
    let now_ms = fleetgate_application::Clock::now_ms(clock);
    WindowHit {
        key: key.to_owned(),
        window_start_ms: now_ms - window_ms,
        entry: RateWindowEntry::new(now_ms),
        ttl_seconds: u64::try_from(window_ms / 1000).unwrap_or(1).max(1),
    }
}

#[tokio::test]
async fn window_hits_prune_entries_older_than_the_window() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());

    for _ in 0..3 {
        let counted = store.record_window_hit(&hit(&clock, "rl:api:1.2.3.4", 1_000)).await;
        assert!(counted.is_ok());
    }
    assert_eq!(store.count_window("rl:api:1.2.3.4", 0).await.ok(), Some(3));

    clock.advance(TimeDelta::milliseconds(500));
    let counted = store.record_window_hit(&hit(&clock, "rl:api:1.2.3.4", 1_000)).await;
    assert_eq!(counted.ok(), Some(4));

    clock.advance(TimeDelta::milliseconds(501));
    let counted = store.record_window_hit(&hit(&clock, "rl:api:1.2.3.4", 1_000)).await;
    assert_eq!(counted.ok(), Some(2));
}

#[tokio::test]
async fn oldest_window_entry_is_the_smallest_score() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());
    let first = hit(&clock, "rl:auth:u-1", 60_000);
    let first_ms = first.entry.timestamp_ms;

    assert!(store.record_window_hit(&first).await.is_ok());
    clock.advance(TimeDelta::seconds(5));
    assert!(store.record_window_hit(&hit(&clock, "rl:auth:u-1", 60_000)).await.is_ok());

    assert_eq!(store.oldest_window_entry("rl:auth:u-1").await.ok(), Some(Some(first_ms)));
    assert_eq!(store.oldest_window_entry("rl:auth:other").await.ok(), Some(None));
}

#[tokio::test]
async fn expired_entries_disappear() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());
    assert!(store.set("car:car-1", "{}", Some(10)).await.is_ok());
    assert!(store.set("fleet:all", "[]", None).await.is_ok());

    assert_eq!(store.ttl("car:car-1").await.ok(), Some(10));
    assert_eq!(store.ttl("fleet:all").await.ok(), Some(-1));
    assert_eq!(store.ttl("car:missing").await.ok(), Some(-2));

    clock.advance(TimeDelta::seconds(10));
    assert_eq!(store.get("car:car-1").await.ok(), Some(None));
    assert_eq!(store.exists("car:car-1").await.ok(), Some(false));
    assert_eq!(store.exists("fleet:all").await.ok(), Some(true));
}

#[tokio::test]
async fn text_operations_reject_window_keys() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());
    assert!(store.record_window_hit(&hit(&clock, "rl:api:x", 1_000)).await.is_ok());

    assert!(store.get("rl:api:x").await.is_err());
}

#[tokio::test]
async fn scan_walks_the_key_space_in_batches() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock);
    for key in ["availability:c1:d1", "car:c1", "car:c2", "car:c3", "fleet:all"] {
        assert!(store.set(key, "1", None).await.is_ok());
    }

    let mut cursor = 0;
    let mut found = Vec::new();
    let mut rounds = 0;
    loop {
        let page = store
            .scan(cursor, "car:*", 2)
            .await
            .unwrap_or_else(|_| unreachable!());
        found.extend(page.keys);
        rounds += 1;
        cursor = page.next_cursor;
        if cursor == 0 {
            break;
        }
    }

    assert_eq!(rounds, 3);
    assert_eq!(found, vec!["car:c1", "car:c2", "car:c3"]);
    assert!(store.scan(0, "", 10).await.is_err());
}

async fn scan_all(
    store: &InMemoryKeyValueStore,
    pattern: &str,
    between_rounds: impl AsyncFn(),
) -> Vec<String> {
    let mut cursor = 0;
    let mut found = Vec::new();
    loop {
        let page = store
            .scan(cursor, pattern, 2)
            .await
            .unwrap_or_else(|_| unreachable!());
        found.extend(page.keys);
        cursor = page.next_cursor;
        if cursor == 0 {
            return found;
        }
        between_rounds().await;
    }
}

#[tokio::test]
async fn scan_returns_live_keys_after_earlier_keys_expire() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());
    assert!(store.set("fleet:a", "1", Some(1)).await.is_ok());
    for key in ["fleet:b", "fleet:c", "fleet:d"] {
        assert!(store.set(key, "1", None).await.is_ok());
    }

    let found = scan_all(&store, "fleet:*", async || {
        clock.advance(TimeDelta::seconds(2));
        assert_eq!(store.get("fleet:a").await.ok(), Some(None));
    })
    .await;

    assert_eq!(found, vec!["fleet:a", "fleet:b", "fleet:c", "fleet:d"]);
}

#[tokio::test]
async fn scan_survives_deletes_between_rounds() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock);
    for key in ["car:c1", "car:c2", "car:c3", "car:c4", "car:c5"] {
        assert!(store.set(key, "1", None).await.is_ok());
    }

    let found = scan_all(&store, "car:*", async || {
        let removed = store
            .delete(&["car:c1".to_owned(), "car:c2".to_owned()])
            .await;
        assert!(removed.is_ok());
    })
    .await;

    assert_eq!(found, vec!["car:c1", "car:c2", "car:c3", "car:c4", "car:c5"]);
}

#[tokio::test]
async fn expired_keys_are_skipped_by_scan() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock.clone());
    assert!(store.set("fleet:a", "1", Some(1)).await.is_ok());
    assert!(store.set("fleet:b", "1", None).await.is_ok());
    clock.advance(TimeDelta::seconds(2));

    let page = store
        .scan(0, "fleet:*", 10)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(page.keys, vec!["fleet:b"]);
    assert_eq!(page.next_cursor, 0);
}

#[tokio::test]
async fn unknown_scan_cursor_is_rejected() {
    let store = InMemoryKeyValueStore::new(clock());
    assert!(store.scan(42, "car:*", 2).await.is_err());
}

#[tokio::test]
async fn delete_counts_only_existing_keys() {
    let clock = clock();
    let store = InMemoryKeyValueStore::new(clock);
    assert!(store.set("car:c1", "1", None).await.is_ok());

    let removed = store
        .delete(&["car:c1".to_owned(), "car:c2".to_owned()])
        .await;
    assert_eq!(removed.ok(), Some(1));
}

#[tokio::test]
async fn factory_backs_the_application_services() {
    let clock = clock();
    let factory = InMemoryStoreFactory::new(clock.clone());
    let connector = StoreConnector::new(
        Arc::new(factory.clone()),
        RetryPolicy::new(1, Duration::from_millis(1), Duration::from_millis(1)),
    );

    let limiter = RateLimitService::new(connector.clone(), clock.clone());
    let config = RateLimitConfig::new(Duration::from_secs(60), 2, "api")
        .unwrap_or_else(|_| unreachable!());
    assert!(limiter.check_limit("10.0.0.1", &config).await.allowed);
    assert!(limiter.check_limit("10.0.0.1", &config).await.allowed);
    assert!(!limiter.check_limit("10.0.0.1", &config).await.allowed);

    let cache = CacheService::new(connector);
    assert!(cache.set("fleet:all", &vec!["car-1"], Some(300)).await);
    assert_eq!(
        factory.store().get("fleet:all").await.ok(),
        Some(Some("[\"car-1\"]".to_owned()))
    );
}
