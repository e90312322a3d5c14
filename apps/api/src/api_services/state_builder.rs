use std::sync::Arc;

use fleetgate_application::{
    CacheInvalidator, CacheService, CacheWarmer, Clock, RateLimitPolicies, RateLimitService,
    StoreConnector, TokenVerifier, ViolationLog, WarmingOptions,
};
use fleetgate_core::AppError;
use fleetgate_domain::CacheCatalog;
use fleetgate_infrastructure::{InMemoryFleetCatalog, JwtTokenVerifier};
use tracing::info;

use crate::api_config::ApiConfig;
use crate::middleware::IdentityResolver;
use crate::state::AppState;

use super::store::build_store_connector;

/// Collaborators the state is assembled from.
pub struct StateInputs {
    pub clock: Arc<dyn Clock>,
    pub connector: StoreConnector,
    pub policies: RateLimitPolicies,
    pub violation_capacity: usize,
    pub verifier: Arc<dyn TokenVerifier>,
    pub fleet: Arc<InMemoryFleetCatalog>,
    pub warming_options: WarmingOptions,
}

pub fn build_app_state(config: &ApiConfig, clock: Arc<dyn Clock>) -> Result<AppState, AppError> {
    let connector = build_store_connector(config, clock.clone());
    let policies = RateLimitPolicies::scaled(config.rate_limit_multiplier)?;

    Ok(assemble_app_state(StateInputs {
        clock,
        connector,
        policies,
        violation_capacity: config.violation_capacity,
        verifier: Arc::new(JwtTokenVerifier::new(config.jwt_secret.as_str())),
        fleet: Arc::new(load_fleet(config.fleet_seed_path.as_deref())?),
        warming_options: config.warming,
    }))
}

pub fn assemble_app_state(inputs: StateInputs) -> AppState {
    let cache_catalog = CacheCatalog::default();
    let cache_service = CacheService::new(inputs.connector.clone());
    let source = inputs.fleet.clone();

    AppState {
        clock: inputs.clock.clone(),
        rate_limit_service: RateLimitService::new(inputs.connector, inputs.clock.clone()),
        rate_limit_policies: inputs.policies,
        violation_log: Arc::new(ViolationLog::new(inputs.violation_capacity)),
        cache_invalidator: CacheInvalidator::new(cache_service.clone(), cache_catalog.all()),
        cache_warmer: CacheWarmer::new(
            cache_service.clone(),
            source,
            cache_catalog.clone(),
            inputs.clock,
        ),
        cache_service,
        cache_catalog,
        warming_options: inputs.warming_options,
        identity: IdentityResolver::new(inputs.verifier),
        fleet: inputs.fleet,
    }
}

fn load_fleet(seed_path: Option<&str>) -> Result<InMemoryFleetCatalog, AppError> {
    let Some(path) = seed_path else {
        info!("no FLEET_SEED_PATH configured; serving the demo fleet");
        return Ok(InMemoryFleetCatalog::demo());
    };

    let document = std::fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read FLEET_SEED_PATH '{path}': {error}"))
    })?;
    let catalog = InMemoryFleetCatalog::from_json(document.as_str())?;
    info!(path = %path, "fleet seed loaded");

    Ok(catalog)
}
