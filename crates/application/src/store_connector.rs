//! Lazily established, shared store connection.
//!
//! One connector is built per process and cloned into every service. The
//! first `connection()` call asks the factory for a client; construction
//! failures hand over to a supervised reconnect loop while callers keep
//! running in fail-open mode. Once that loop gives up the connector stays
//! offline until `reset_connection_state` is called.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::store_ports::{KeyValueStore, StoreFactory};

mod retry;

#[cfg(test)]
mod tests;

pub use retry::RetryPolicy;

enum ConnectionState {
    Uninitialized,
    Connected(Arc<dyn KeyValueStore>),
    Disabled,
    Failed,
    Exhausted,
}

struct ConnectorInner {
    factory: Arc<dyn StoreFactory>,
    policy: RetryPolicy,
    state: RwLock<ConnectionState>,
    healthy: AtomicBool,
    connecting: Mutex<()>,
    retry_task: Mutex<Option<JoinHandle<bool>>>,
}

/// Shared handle to the key-value store.
#[derive(Clone)]
pub struct StoreConnector {
    inner: Arc<ConnectorInner>,
}

impl StoreConnector {
    /// Creates a connector; nothing is dialed until first use.
    #[must_use]
    pub fn new(factory: Arc<dyn StoreFactory>, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(ConnectorInner {
                factory,
                policy,
                state: RwLock::new(ConnectionState::Uninitialized),
                healthy: AtomicBool::new(false),
                connecting: Mutex::new(()),
                retry_task: Mutex::new(None),
            }),
        }
    }

    /// Returns the live client, or `None` when the store is disabled or
    /// currently unreachable. Never fails.
    ///
    /// Only one caller dials at a time; concurrent callers get `None`
    /// instead of waiting on the dial.
    pub async fn connection(&self) -> Option<Arc<dyn KeyValueStore>> {
        if let Some(settled) = self.settled_state().await {
            return settled;
        }

        let Ok(_dialing) = self.inner.connecting.try_lock() else {
            return None;
        };
        if let Some(settled) = self.settled_state().await {
            return settled;
        }

        match self.inner.factory.connect().await {
            Ok(Some(store)) => {
                *self.inner.state.write().await = ConnectionState::Connected(Arc::clone(&store));
                self.inner.healthy.store(true, Ordering::Relaxed);
                info!("store connection established");
                Some(store)
            }
            Ok(None) => {
                *self.inner.state.write().await = ConnectionState::Disabled;
                self.inner.healthy.store(false, Ordering::Relaxed);
                warn!("store credentials absent or insecure; rate limiting and caching disabled");
                None
            }
            Err(error) => {
                *self.inner.state.write().await = ConnectionState::Failed;
                self.inner.healthy.store(false, Ordering::Relaxed);
                warn!(error = %error, "store connection failed; scheduling reconnect");
                self.ensure_retry_loop().await;
                None
            }
        }
    }

    /// Pings the store and updates the cached health flag.
    pub async fn health_check(&self) -> bool {
        let Some(store) = self.connection().await else {
            self.inner.healthy.store(false, Ordering::Relaxed);
            return false;
        };

        let healthy = match store.ping().await {
            Ok(()) => true,
            Err(error) => {
                warn!(error = %error, "store health check failed");
                false
            }
        };
        self.inner.healthy.store(healthy, Ordering::Relaxed);
        healthy
    }

    /// Last known health without touching the network.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Relaxed)
    }

    /// Drops the connection and stops any reconnect loop.
    pub async fn disconnect(&self) {
        self.reset_connection_state().await;
        info!("store connection closed");
    }

    /// Returns to the lazy initial state so the next call reconnects.
    pub async fn reset_connection_state(&self) {
        if let Some(handle) = self.inner.retry_task.lock().await.take() {
            handle.abort();
        }
        *self.inner.state.write().await = ConnectionState::Uninitialized;
        self.inner.healthy.store(false, Ordering::Relaxed);
    }

    /// Reconnects with exponential backoff; returns whether a client was
    /// established within the policy's attempts.
    pub async fn retry_with_backoff(&self) -> bool {
        let policy = self.inner.policy;

        for attempt in 1..=policy.max_attempts {
            let delay = policy.delay_for(attempt);
            tokio::time::sleep(delay).await;

            match self.inner.factory.connect().await {
                Ok(Some(store)) => {
                    *self.inner.state.write().await = ConnectionState::Connected(store);
                    self.inner.healthy.store(true, Ordering::Relaxed);
                    info!(attempt, "store reconnected");
                    return true;
                }
                Ok(None) => {
                    *self.inner.state.write().await = ConnectionState::Disabled;
                    warn!(attempt, "store disabled during reconnect");
                    return false;
                }
                Err(error) => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "store reconnect attempt failed"
                    );
                }
            }
        }

        *self.inner.state.write().await = ConnectionState::Exhausted;
        error!(
            attempts = policy.max_attempts,
            "store reconnect attempts exhausted; staying offline until reset"
        );
        false
    }

    /// Waits for the background reconnect loop, if one was started.
    pub async fn wait_for_retry(&self) -> Option<bool> {
        let handle = self.inner.retry_task.lock().await.take()?;
        handle.await.ok()
    }

    /// Resolves every state except `Uninitialized`, which needs a dial.
    async fn settled_state(&self) -> Option<Option<Arc<dyn KeyValueStore>>> {
        let failed = match &*self.inner.state.read().await {
            ConnectionState::Connected(store) => return Some(Some(Arc::clone(store))),
            ConnectionState::Disabled | ConnectionState::Exhausted => return Some(None),
            ConnectionState::Failed => true,
            ConnectionState::Uninitialized => false,
        };
        if failed {
            self.ensure_retry_loop().await;
            return Some(None);
        }

        None
    }

    async fn ensure_retry_loop(&self) {
        let mut task = self.inner.retry_task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let connector = self.clone();
        *task = Some(tokio::spawn(async move {
            connector.retry_with_backoff().await
        }));
    }
}
