use std::sync::Arc;

use fleetgate_application::{
    CacheInvalidator, CacheService, CacheWarmer, Clock, RateLimitPolicies, RateLimitService,
    ViolationLog, WarmingOptions,
};
use fleetgate_domain::CacheCatalog;
use fleetgate_infrastructure::InMemoryFleetCatalog;

use crate::middleware::IdentityResolver;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub clock: Arc<dyn Clock>,
    pub rate_limit_service: RateLimitService,
    pub rate_limit_policies: RateLimitPolicies,
    pub violation_log: Arc<ViolationLog>,
    pub cache_service: CacheService,
    pub cache_catalog: CacheCatalog,
    pub cache_invalidator: CacheInvalidator,
    pub cache_warmer: CacheWarmer,
    pub warming_options: WarmingOptions,
    pub identity: IdentityResolver,
    pub fleet: Arc<InMemoryFleetCatalog>,
}
