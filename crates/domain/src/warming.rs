use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall outcome of one warming run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarmingStatus {
    /// Every task succeeded.
    Success,
    /// Some keys were warmed despite errors.
    Partial,
    /// Nothing was warmed.
    Failed,
}

impl WarmingStatus {
    /// Derives the status from warmed key and error counts.
    #[must_use]
    pub fn from_outcome(keys_warmed: u64, error_count: usize) -> Self {
        if error_count == 0 {
            Self::Success
        } else if keys_warmed > 0 {
            Self::Partial
        } else {
            Self::Failed
        }
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Metrics for one warming run, held in memory for the last-run accessor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWarmingMetrics {
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Number of tasks that completed successfully.
    pub keys_warmed: u64,
    /// One formatted message per failed task.
    pub errors: Vec<String>,
    /// Derived outcome.
    pub status: WarmingStatus,
}

impl CacheWarmingMetrics {
    /// Builds the metrics of a finished run.
    #[must_use]
    pub fn finish(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        keys_warmed: u64,
        errors: Vec<String>,
    ) -> Self {
        let duration_ms = u64::try_from((finished_at - started_at).num_milliseconds()).unwrap_or(0);
        let status = WarmingStatus::from_outcome(keys_warmed, errors.len());

        Self {
            started_at,
            finished_at,
            duration_ms,
            keys_warmed,
            errors,
            status,
        }
    }
}
