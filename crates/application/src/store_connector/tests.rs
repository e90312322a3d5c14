use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fleetgate_core::AppResult;
use tokio::sync::Notify;

use crate::store_ports::{KeyValueStore, StoreFactory};
use crate::test_support::{FactoryOutcome, FakeFactory, FakeStore, fast_retry_policy, manual_clock};

use super::StoreConnector;

/// Factory whose dial blocks until the test opens the gate.
struct GatedFactory {
    store: Arc<FakeStore>,
    gate: Notify,
    calls: AtomicUsize,
}

#[async_trait]
impl StoreFactory for GatedFactory {
    async fn connect(&self) -> AppResult<Option<Arc<dyn KeyValueStore>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        let store: Arc<dyn KeyValueStore> = self.store.clone();
        Ok(Some(store))
    }
}

fn connector_with(outcomes: Vec<FactoryOutcome>) -> (StoreConnector, Arc<FakeFactory>, Arc<FakeStore>) {
    let store = Arc::new(FakeStore::new(manual_clock()));
    let factory = Arc::new(FakeFactory::new(store.clone(), outcomes));
    let connector = StoreConnector::new(factory.clone(), fast_retry_policy());
    (connector, factory, store)
}

#[tokio::test]
async fn connects_lazily_and_only_once() {
    let (connector, factory, _) = connector_with(Vec::new());
    assert_eq!(factory.calls(), 0);
    assert!(!connector.is_healthy());

    assert!(connector.connection().await.is_some());
    assert!(connector.connection().await.is_some());
    assert_eq!(factory.calls(), 1);
    assert!(connector.is_healthy());
}

#[tokio::test]
async fn disabled_store_stays_disabled_without_retrying() {
    let (connector, factory, _) = connector_with(vec![FactoryOutcome::Disabled]);

    assert!(connector.connection().await.is_none());
    assert!(connector.connection().await.is_none());
    assert_eq!(factory.calls(), 1);
    assert!(connector.wait_for_retry().await.is_none());
    assert!(!connector.is_healthy());
}

#[tokio::test]
async fn construction_failure_recovers_through_backoff_loop() {
    let (connector, factory, _) =
        connector_with(vec![FactoryOutcome::Fail, FactoryOutcome::Fail]);

    assert!(connector.connection().await.is_none());
    assert_eq!(connector.wait_for_retry().await, Some(true));
    assert_eq!(factory.calls(), 3);
    assert!(connector.connection().await.is_some());
    assert!(connector.is_healthy());
}

#[tokio::test]
async fn backoff_loop_gives_up_after_max_attempts() {
    let (connector, factory, _) = connector_with(vec![FactoryOutcome::Fail; 6]);

    assert!(connector.connection().await.is_none());
    assert_eq!(connector.wait_for_retry().await, Some(false));
    assert_eq!(factory.calls(), 4);
    assert!(!connector.is_healthy());

    for _ in 0..3 {
        assert!(connector.connection().await.is_none());
        assert!(connector.wait_for_retry().await.is_none());
    }
    assert!(!connector.health_check().await);
    assert_eq!(factory.calls(), 4);
}

#[tokio::test]
async fn reset_after_exhaustion_dials_again() {
    let (connector, factory, _) = connector_with(vec![FactoryOutcome::Fail; 4]);

    assert!(connector.connection().await.is_none());
    assert_eq!(connector.wait_for_retry().await, Some(false));
    assert!(connector.connection().await.is_none());
    assert_eq!(factory.calls(), 4);

    connector.reset_connection_state().await;
    assert!(connector.connection().await.is_some());
    assert_eq!(factory.calls(), 5);
    assert!(connector.is_healthy());
}

#[tokio::test]
async fn callers_fail_open_while_the_first_dial_is_pending() {
    let factory = Arc::new(GatedFactory {
        store: Arc::new(FakeStore::new(manual_clock())),
        gate: Notify::new(),
        calls: AtomicUsize::new(0),
    });
    let connector = StoreConnector::new(factory.clone(), fast_retry_policy());

    let dialing = tokio::spawn({
        let connector = connector.clone();
        async move { connector.connection().await.is_some() }
    });
    while factory.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let concurrent = tokio::time::timeout(Duration::from_secs(1), connector.connection()).await;
    assert!(matches!(concurrent, Ok(None)));
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);

    factory.gate.notify_one();
    assert!(dialing.await.unwrap_or_default());
    assert!(connector.connection().await.is_some());
    assert_eq!(factory.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn retry_can_be_awaited_directly() {
    let (connector, _, _) = connector_with(vec![FactoryOutcome::Fail]);

    assert!(connector.retry_with_backoff().await);
    assert!(connector.connection().await.is_some());
}

#[tokio::test]
async fn health_check_tracks_ping_failures() {
    let (connector, _, store) = connector_with(Vec::new());
    assert!(connector.health_check().await);

    store.set_failing(true);
    assert!(!connector.health_check().await);
    assert!(!connector.is_healthy());

    store.set_failing(false);
    assert!(connector.health_check().await);
}

#[tokio::test]
async fn reset_forces_a_fresh_connection() {
    let (connector, factory, _) = connector_with(Vec::new());
    assert!(connector.connection().await.is_some());

    connector.reset_connection_state().await;
    assert!(!connector.is_healthy());
    assert!(connector.connection().await.is_some());
    assert_eq!(factory.calls(), 2);

    connector.disconnect().await;
    assert!(!connector.is_healthy());
}
