//! Background population of predictably hot cache entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use fleetgate_core::{AppError, AppResult};
use fleetgate_domain::{CacheCatalog, CacheWarmingMetrics};

use crate::cache_service::CacheService;
use crate::clock::Clock;

mod ports;
mod task;


pub use ports::WarmingSource;
pub use task::{WarmingOptions, WarmingTask};

const FLEET_LISTING_PRIORITY: i32 = 100;
const CAR_DETAILS_PRIORITY: i32 = 50;
const AVAILABILITY_PRIORITY: i32 = 10;

/// Runs warming passes and keeps the metrics of the last one.
#[derive(Clone)]
pub struct CacheWarmer {
    cache: CacheService,
    source: Arc<dyn WarmingSource>,
    catalog: CacheCatalog,
    clock: Arc<dyn Clock>,
    last_metrics: Arc<RwLock<Option<CacheWarmingMetrics>>>,
}

impl CacheWarmer {
    /// Creates a new cache warmer.
    #[must_use]
    pub fn new(
        cache: CacheService,
        source: Arc<dyn WarmingSource>,
        catalog: CacheCatalog,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            cache,
            source,
            catalog,
            clock,
            last_metrics: Arc::new(RwLock::new(None)),
        }
    }

    /// Warms the fleet listing, popular car details and their near-term
    /// availability.
    pub async fn warm_cache(&self, options: WarmingOptions) -> CacheWarmingMetrics {
        let started_at = self.clock.now();
        let mut errors = Vec::new();
        let tasks = self.plan(&options, &mut errors).await;

        self.run(tasks, options, started_at, errors).await
    }

    /// Runs caller-supplied tasks with the same isolation and bounds.
    pub async fn warm_tasks(
        &self,
        tasks: Vec<WarmingTask>,
        options: WarmingOptions,
    ) -> CacheWarmingMetrics {
        let started_at = self.clock.now();
        self.run(tasks, options, started_at, Vec::new()).await
    }

    /// Metrics of the last finished run.
    pub async fn metrics(&self) -> Option<CacheWarmingMetrics> {
        self.last_metrics.read().await.clone()
    }

    /// Schedules a warming run after `options.startup_delay` without
    /// blocking the caller. Failures are logged, never propagated.
    pub fn warm_on_startup(&self, options: WarmingOptions) -> JoinHandle<()> {
        let warmer = self.clone();

        tokio::spawn(async move {
            tokio::time::sleep(options.startup_delay).await;
            if !warmer.cache.is_available().await {
                info!("cache unavailable; startup warming skipped");
                return;
            }

            let run = tokio::spawn(async move { warmer.warm_cache(options).await });
            match run.await {
                Ok(metrics) => info!(
                    status = metrics.status.as_str(),
                    keys_warmed = metrics.keys_warmed,
                    errors = metrics.errors.len(),
                    "startup cache warming finished"
                ),
                Err(join_error) => error!(error = %join_error, "startup cache warming aborted"),
            }
        })
    }

    async fn plan(&self, options: &WarmingOptions, errors: &mut Vec<String>) -> Vec<WarmingTask> {
        let mut tasks = vec![self.fleet_listing_task()];

        match self.source.popular_car_ids(options.popular_limit).await {
            Ok(car_ids) => {
                let today = self.clock.now().date_naive();
                for car_id in car_ids {
                    tasks.push(self.car_details_task(car_id.clone()));
                    for offset in 0..options.days_ahead {
                        if let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) {
                            tasks.push(self.availability_task(car_id.clone(), date));
                        }
                    }
                }
            }
            Err(error) => {
                warn!(error = %error, "failed to list popular cars for warming");
                errors.push(format!("popular cars: {error}"));
            }
        }

        tasks
    }

    fn fleet_listing_task(&self) -> WarmingTask {
        let cache = self.cache.clone();
        let source = Arc::clone(&self.source);
        let config = self.catalog.fleet.clone();

        WarmingTask::new("fleet listing", FLEET_LISTING_PRIORITY, async move {
            let listing = source.fleet_listing().await?;
            store_entry(&cache, config.key(&["all"]), &listing, config.ttl_seconds).await
        })
    }

    fn car_details_task(&self, car_id: String) -> WarmingTask {
        let cache = self.cache.clone();
        let source = Arc::clone(&self.source);
        let config = self.catalog.car_details.clone();

        WarmingTask::new(
            format!("car details {car_id}"),
            CAR_DETAILS_PRIORITY,
            async move {
                let details = source
                    .car_details(car_id.as_str())
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("car '{car_id}' does not exist")))?;
                let key = config.key(&[car_id.as_str()]);
                store_entry(&cache, key, &details, config.ttl_seconds).await
            },
        )
    }

    fn availability_task(&self, car_id: String, date: NaiveDate) -> WarmingTask {
        let cache = self.cache.clone();
        let source = Arc::clone(&self.source);
        let config = self.catalog.availability.clone();

        WarmingTask::new(
            format!("availability {car_id} {date}"),
            AVAILABILITY_PRIORITY,
            async move {
                let availability = source.availability(car_id.as_str(), date).await?;
                let day = date.to_string();
                let key = config.key(&[car_id.as_str(), day.as_str()]);
                store_entry(&cache, key, &availability, config.ttl_seconds).await
            },
        )
    }

    async fn run(
        &self,
        mut tasks: Vec<WarmingTask>,
        options: WarmingOptions,
        started_at: DateTime<Utc>,
        mut errors: Vec<String>,
    ) -> CacheWarmingMetrics {
        tasks.sort_by(|left, right| right.priority().cmp(&left.priority()));

        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(options.max_concurrency.max(1)));
        let batch_size = options.batch_size.max(1);
        let mut keys_warmed: u64 = 0;
        let mut pending = tasks.into_iter().peekable();

        while pending.peek().is_some() {
            let mut join_set = JoinSet::new();
            let mut names = HashMap::new();

            for task in pending.by_ref().take(batch_size) {
                let (name, job) = task.into_parts();
                let semaphore = Arc::clone(&semaphore);
                let handle = join_set.spawn(async move {
                    let started = Instant::now();
                    let outcome = match semaphore.acquire_owned().await {
                        Ok(_permit) => job.await,
                        Err(error) => Err(AppError::Internal(format!(
                            "warming semaphore closed: {error}"
                        ))),
                    };
                    (outcome, started.elapsed())
                });
                names.insert(handle.id(), name);
            }

            while let Some(joined) = join_set.join_next_with_id().await {
                match joined {
                    Ok((id, (Ok(()), elapsed))) => {
                        keys_warmed += 1;
                        debug!(
                            task = task_name(&names, id),
                            elapsed_ms = millis(elapsed),
                            "warming task finished"
                        );
                    }
                    Ok((id, (Err(task_error), elapsed))) => {
                        let name = task_name(&names, id);
                        warn!(
                            task = name,
                            elapsed_ms = millis(elapsed),
                            error = %task_error,
                            "warming task failed"
                        );
                        errors.push(format!("{name}: {task_error}"));
                    }
                    Err(join_error) => {
                        let name = task_name(&names, join_error.id());
                        warn!(task = name, error = %join_error, "warming task aborted");
                        errors.push(format!("{name}: {join_error}"));
                    }
                }
            }
        }

        let metrics =
            CacheWarmingMetrics::finish(started_at, self.clock.now(), keys_warmed, errors);
        info!(
            tasks = total,
            keys_warmed = metrics.keys_warmed,
            errors = metrics.errors.len(),
            duration_ms = metrics.duration_ms,
            status = metrics.status.as_str(),
            "cache warming run finished"
        );
        *self.last_metrics.write().await = Some(metrics.clone());

        metrics
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn task_name(names: &HashMap<tokio::task::Id, String>, id: tokio::task::Id) -> &str {
    names.get(&id).map_or("unknown task", String::as_str)
}

async fn store_entry(
    cache: &CacheService,
    key: String,
    value: &Value,
    ttl_seconds: u64,
) -> AppResult<()> {
    if cache.set(key.as_str(), value, Some(ttl_seconds)).await {
        return Ok(());
    }

    Err(AppError::Store(format!("failed to cache '{key}'")))
}
