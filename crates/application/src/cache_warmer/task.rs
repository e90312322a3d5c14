use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use fleetgate_core::AppResult;

type WarmingJob = Pin<Box<dyn Future<Output = AppResult<()>> + Send>>;

/// One unit of warming work, alive for a single run.
pub struct WarmingTask {
    name: String,
    priority: i32,
    job: WarmingJob,
}

impl WarmingTask {
    /// Creates a task; higher priorities run first.
    pub fn new<F>(name: impl Into<String>, priority: i32, job: F) -> Self
    where
        F: Future<Output = AppResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            priority,
            job: Box::pin(job),
        }
    }

    /// Returns the task name used in error messages.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the task priority.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(super) fn into_parts(self) -> (String, WarmingJob) {
        (self.name, self.job)
    }
}

impl fmt::Debug for WarmingTask {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WarmingTask")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Bounds of one warming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmingOptions {
    /// Number of popular cars whose details and availability are warmed.
    pub popular_limit: usize,
    /// Days of availability warmed per popular car, today included.
    pub days_ahead: u32,
    /// Tasks in flight at once.
    pub max_concurrency: usize,
    /// Tasks per batch.
    pub batch_size: usize,
    /// Delay before the startup run.
    pub startup_delay: Duration,
}

impl Default for WarmingOptions {
    fn default() -> Self {
        Self {
            popular_limit: 10,
            days_ahead: 7,
            max_concurrency: 5,
            batch_size: 20,
            startup_delay: Duration::from_secs(5),
        }
    }
}
