use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::{CacheCatalog, events};

use crate::ManualClock;
use crate::test_support::{FakeStore, connected, disabled, manual_clock};

use super::{CacheInvalidator, CacheService};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Listing {
    id: String,
    daily_rate_cents: i64,
}

fn listing(id: &str) -> Listing {
    Listing {
        id: id.to_owned(),
        daily_rate_cents: 4_900,
    }
}

fn cache() -> (CacheService, Arc<ManualClock>, Arc<FakeStore>) {
    let clock = manual_clock();
    let store = Arc::new(FakeStore::new(clock.clone()));
    (CacheService::new(connected(store.clone())), clock, store)
}

#[tokio::test]
async fn round_trip_until_ttl_elapses() {
    let (cache, clock, _) = cache();
    let value = listing("car-1");

    assert!(cache.set("car:car-1", &value, Some(60)).await);
    assert_eq!(cache.get::<Listing>("car:car-1").await, Some(value));
    assert_eq!(cache.ttl("car:car-1").await, 60);
    assert!(cache.exists("car:car-1").await);

    clock.advance(TimeDelta::seconds(61));
    assert_eq!(cache.get::<Listing>("car:car-1").await, None);
    assert!(!cache.exists("car:car-1").await);
    assert_eq!(cache.ttl("car:car-1").await, -2);
}

#[tokio::test]
async fn set_without_ttl_never_expires() {
    let (cache, clock, _) = cache();
    assert!(cache.set("fleet:all", &vec![listing("car-1")], None).await);

    clock.advance(TimeDelta::days(30));
    assert_eq!(cache.ttl("fleet:all").await, -1);
    assert!(cache.get::<Vec<Listing>>("fleet:all").await.is_some());
}

#[tokio::test]
async fn delete_removes_key() {
    let (cache, _, _) = cache();
    assert!(cache.set("car:car-1", &listing("car-1"), Some(60)).await);

    assert!(cache.delete("car:car-1").await);
    assert!(cache.get::<Listing>("car:car-1").await.is_none());
}

#[tokio::test]
async fn invalidate_removes_exactly_the_matching_keys_across_scan_rounds() {
    let (cache, _, store) = cache();
    for key in [
        "availability:car-1:2026-10-20",
        "availability:car-1:2026-10-21",
        "availability:car-2:2026-10-20",
        "car:car-1",
        "car:car-2",
        "fleet:all",
    ] {
        assert!(cache.set(key, &1, Some(300)).await);
    }

    assert_eq!(cache.invalidate("car:*").await, 2);
    assert_eq!(
        store.keys(),
        vec![
            "availability:car-1:2026-10-20".to_owned(),
            "availability:car-1:2026-10-21".to_owned(),
            "availability:car-2:2026-10-20".to_owned(),
            "fleet:all".to_owned(),
        ]
    );

    assert_eq!(cache.invalidate("reviews:*").await, 0);
    assert_eq!(store.keys().len(), 4);
}

#[tokio::test]
async fn invalidate_by_tags_sums_each_tag() {
    let (cache, _, _) = cache();
    for key in [
        "availability:car-1:2026-10-20",
        "bookings:car-1:b-7",
        "availability:car-2:2026-10-20",
    ] {
        assert!(cache.set(key, &true, None).await);
    }

    assert_eq!(cache.invalidate_by_tags(&["car-1", "car-2"]).await, 3);
    assert_eq!(cache.invalidate_by_tags(&["car-3"]).await, 0);
}

#[tokio::test]
async fn failing_store_returns_safe_defaults() {
    let (cache, _, store) = cache();
    assert!(cache.set("car:car-1", &listing("car-1"), Some(60)).await);
    store.set_failing(true);

    for _ in 0..3 {
        assert!(cache.get::<Listing>("car:car-1").await.is_none());
    }
    assert!(!cache.set("car:car-1", &listing("car-1"), Some(60)).await);
    assert!(!cache.delete("car:car-1").await);
    assert_eq!(cache.invalidate("car:*").await, 0);
    assert!(!cache.exists("car:car-1").await);
    assert_eq!(cache.ttl("car:car-1").await, -1);
}

#[tokio::test]
async fn disabled_store_returns_safe_defaults() {
    let clock = manual_clock();
    let cache = CacheService::new(disabled(Arc::new(FakeStore::new(clock))));

    assert!(cache.get::<Listing>("car:car-1").await.is_none());
    assert!(!cache.set("car:car-1", &listing("car-1"), None).await);
    assert_eq!(cache.invalidate_by_tags(&["car-1"]).await, 0);
    assert_eq!(cache.ttl("car:car-1").await, -1);
    assert!(!cache.is_available().await);
}

#[tokio::test]
async fn undecodable_entry_reads_as_miss() {
    let (cache, _, _) = cache();
    assert!(cache.set("car:car-1", &"not a listing", None).await);
    assert!(cache.get::<Listing>("car:car-1").await.is_none());
}

#[tokio::test]
async fn get_or_load_populates_on_miss_only() {
    let (cache, _, _) = cache();
    let counter = AtomicUsize::new(0);
    let loads = &counter;
    let load = move || async move {
        loads.fetch_add(1, Ordering::SeqCst);
        Ok::<_, AppError>(listing("car-9"))
    };

    let first = cache.get_or_load("car:car-9", Some(60), load).await;
    let second = cache.get_or_load("car:car-9", Some(60), load).await;

    assert_eq!(first.ok(), Some(listing("car-9")));
    assert_eq!(second.ok(), Some(listing("car-9")));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn get_or_load_propagates_loader_errors() {
    let (cache, _, _) = cache();
    let result: AppResult<Listing> = cache
        .get_or_load("car:missing", Some(60), || async {
            Err(AppError::NotFound("car 'missing' does not exist".to_owned()))
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert!(!cache.exists("car:missing").await);
}

#[tokio::test]
async fn get_or_load_serves_the_loaded_value_when_the_store_fails() {
    let (cache, _, store) = cache();
    store.set_failing(true);

    let loaded = cache
        .get_or_load("car:car-3", Some(60), || async {
            Ok::<_, AppError>(listing("car-3"))
        })
        .await;
    assert_eq!(loaded.ok(), Some(listing("car-3")));

    store.set_failing(false);
    assert!(!cache.exists("car:car-3").await);
}

#[tokio::test]
async fn invalidate_skips_expired_keys_without_losing_live_ones() {
    let (cache, clock, store) = cache();
    assert!(cache.set("fleet:a", &listing("a"), Some(1)).await);
    for key in ["fleet:b", "fleet:c", "fleet:d"] {
        assert!(cache.set(key, &listing(key), None).await);
    }
    clock.advance(TimeDelta::seconds(2));

    assert_eq!(cache.invalidate("fleet:*").await, 3);
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn car_update_event_leaves_availability_intact() {
    let (cache, _, store) = cache();
    let catalog = CacheCatalog::default();
    let invalidator = CacheInvalidator::new(cache.clone(), catalog.all());

    let fleet_key = catalog.fleet.key(&["all"]);
    let details_key = catalog.car_details.key(&["car-1"]);
    let availability_key = catalog.availability.key(&["car-1", "2026-10-20"]);
    for key in [&fleet_key, &details_key, &availability_key] {
        assert!(cache.set(key.as_str(), &1, None).await);
    }

    let names: Vec<&str> = invalidator
        .configs_for(events::CAR_UPDATED)
        .into_iter()
        .map(|config| config.name.as_str())
        .collect();
    assert_eq!(names, vec!["fleet", "car_details"]);

    assert_eq!(invalidator.handle_event(events::CAR_UPDATED).await, 2);
    assert_eq!(store.keys(), vec![availability_key]);
}

#[test]
fn generate_key_is_pure_composition() {
    assert_eq!(
        CacheService::generate_key("availability:", &["car-1", "2026-10-20"]),
        "availability:car-1:2026-10-20"
    );
}
