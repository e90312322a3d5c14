use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use fleetgate_domain::RateLimitViolation;

use crate::rate_limit_service::ViolationObserver;

/// Default number of violations kept in memory.
pub const DEFAULT_VIOLATION_CAPACITY: usize = 1000;

/// Fixed-capacity in-memory log of recent rate limit violations.
///
/// Oldest entries are evicted first once the capacity is reached.
#[derive(Debug)]
pub struct ViolationLog {
    capacity: usize,
    entries: Mutex<VecDeque<RateLimitViolation>>,
}

impl ViolationLog {
    /// Creates a log holding at most `capacity` entries, minimum one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a violation, evicting the oldest when full.
    pub fn record(&self, violation: RateLimitViolation) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(violation);
    }

    /// Returns up to `limit` violations, newest first.
    #[must_use]
    pub fn recent(&self, limit: usize) -> Vec<RateLimitViolation> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of stored violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of stored violations.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every stored violation.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Stored violation counts per endpoint.
    #[must_use]
    pub fn summary(&self) -> BTreeMap<String, usize> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut summary = BTreeMap::new();
        for violation in entries.iter() {
            *summary.entry(violation.endpoint.clone()).or_insert(0) += 1;
        }

        summary
    }
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::new(DEFAULT_VIOLATION_CAPACITY)
    }
}

impl ViolationObserver for ViolationLog {
    fn notify(&self, violation: &RateLimitViolation) {
        self.record(violation.clone());
    }
}
