use std::sync::Arc;

use fleetgate_application::{Clock, StoreConnector, StoreFactory};
use fleetgate_infrastructure::{InMemoryStoreFactory, RedisStoreFactory};
use tracing::{info, warn};

use crate::api_config::{ApiConfig, StoreBackend};

pub fn build_store_connector(config: &ApiConfig, clock: Arc<dyn Clock>) -> StoreConnector {
    let factory: Arc<dyn StoreFactory> = match config.store_backend {
        StoreBackend::Redis => Arc::new(RedisStoreFactory::new(config.store.clone())),
        StoreBackend::Memory => {
            warn!("using the in-memory store; limits and cache entries are not shared");
            Arc::new(InMemoryStoreFactory::new(clock))
        }
    };

    info!(
        backend = ?config.store_backend,
        max_attempts = config.retry_policy.max_attempts,
        "store connector configured"
    );
    StoreConnector::new(factory, config.retry_policy)
}
