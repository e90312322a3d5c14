use tracing::info;

use fleetgate_domain::CacheConfig;

use super::CacheService;

/// Invalidates cache domains in response to domain events.
#[derive(Clone)]
pub struct CacheInvalidator {
    cache: CacheService,
    configs: Vec<CacheConfig>,
}

impl CacheInvalidator {
    /// Creates an invalidator over the given cache domains.
    #[must_use]
    pub fn new(cache: CacheService, configs: Vec<CacheConfig>) -> Self {
        Self { cache, configs }
    }

    /// Cache domains invalidated by `event`.
    #[must_use]
    pub fn configs_for(&self, event: &str) -> Vec<&CacheConfig> {
        self.configs
            .iter()
            .filter(|config| config.matches_event(event))
            .collect()
    }

    /// Clears every domain that listens to `event`; returns removed keys.
    pub async fn handle_event(&self, event: &str) -> u64 {
        let mut removed = 0;
        for config in self.configs_for(event) {
            removed += self
                .cache
                .invalidate(config.invalidation_pattern().as_str())
                .await;
        }

        info!(event, removed, "cache invalidated by domain event");
        removed
    }
}
