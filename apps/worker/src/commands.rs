use std::sync::Arc;
use std::time::Duration;

use fleetgate_application::{
    CacheService, CacheWarmer, Clock, RateLimitPolicies, RateLimitService, StoreConnector,
    StoreFactory, WarmingOptions,
};
use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::{CacheCatalog, CacheWarmingMetrics, WarmingStatus};
use fleetgate_infrastructure::{InMemoryFleetCatalog, InMemoryStoreFactory, RedisStoreFactory};
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::{MonitorArgs, StoreArgs, StoreBackend};


/// Remaining quota of one identifier under one policy.
#[derive(Debug, Serialize)]
pub struct QuotaGauge {
    pub policy: &'static str,
    pub identifier: String,
    pub limit: u32,
    pub remaining: u32,
}

pub fn build_store_connector(store: &StoreArgs, clock: Arc<dyn Clock>) -> StoreConnector {
    let factory: Arc<dyn StoreFactory> = match store.store_backend {
        StoreBackend::Redis => Arc::new(RedisStoreFactory::new(store.redis_settings())),
        StoreBackend::Memory => {
            warn!("using the in-memory store; nothing is shared with the API");
            Arc::new(InMemoryStoreFactory::new(clock))
        }
    };

    StoreConnector::new(factory, store.retry_policy())
}

pub fn load_fleet(seed_path: Option<&str>) -> AppResult<InMemoryFleetCatalog> {
    let Some(path) = seed_path else {
        return Ok(InMemoryFleetCatalog::demo());
    };

    let document = std::fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read FLEET_SEED_PATH '{path}': {error}"))
    })?;
    InMemoryFleetCatalog::from_json(document.as_str())
}

/// One warming pass; fails when nothing could be warmed.
pub async fn run_warm(
    connector: StoreConnector,
    fleet: InMemoryFleetCatalog,
    clock: Arc<dyn Clock>,
    options: WarmingOptions,
) -> AppResult<CacheWarmingMetrics> {
    let warmer = CacheWarmer::new(
        CacheService::new(connector),
        Arc::new(fleet),
        CacheCatalog::default(),
        clock,
    );

    let metrics = warmer.warm_cache(options).await;
    info!(
        keys_warmed = metrics.keys_warmed,
        errors = metrics.errors.len(),
        status = metrics.status.as_str(),
        "warming pass finished"
    );

    if metrics.status == WarmingStatus::Failed {
        return Err(AppError::Store(format!(
            "cache warming failed: {}",
            metrics.errors.join("; ")
        )));
    }

    Ok(metrics)
}

/// Remaining quota for every identifier under every policy.
pub async fn sample_quotas(
    service: &RateLimitService,
    policies: &RateLimitPolicies,
    identifiers: &[String],
) -> Vec<QuotaGauge> {
    let mut gauges = Vec::new();
    for (policy, config) in policies.effective() {
        for identifier in identifiers {
            gauges.push(QuotaGauge {
                policy,
                identifier: identifier.clone(),
                limit: config.max(),
                remaining: service.get_remaining(identifier.as_str(), &config).await,
            });
        }
    }

    gauges
}

pub async fn run_monitor(
    connector: StoreConnector,
    clock: Arc<dyn Clock>,
    policies: RateLimitPolicies,
    args: &MonitorArgs,
) -> AppResult<()> {
    if connector.connection().await.is_none() {
        return Err(AppError::Store(
            "rate limit store is unavailable; nothing to monitor".to_owned(),
        ));
    }

    let service = RateLimitService::new(connector, clock);
    let interval = Duration::from_secs(args.interval_secs.max(1));
    let mut iteration = 0_u64;

    loop {
        for gauge in sample_quotas(&service, &policies, &args.identifiers).await {
            let line = serde_json::to_string(&gauge).map_err(|error| {
                AppError::Internal(format!("failed to encode quota gauge: {error}"))
            })?;
            println!("{line}");
        }

        iteration += 1;
        if args.iterations.is_some_and(|limit| iteration >= limit) {
            return Ok(());
        }
        if !service.is_available().await {
            warn!("rate limit store unavailable; gauges report full quota");
        }
        tokio::time::sleep(interval).await;
    }
}
