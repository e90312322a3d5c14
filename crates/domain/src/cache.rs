//! Cache domains and key composition.

use serde::{Deserialize, Serialize};

/// Domain event names that drive cache invalidation.
pub mod events {
    /// A car was added to the fleet.
    pub const CAR_CREATED: &str = "car.created";
    /// A car listing changed.
    pub const CAR_UPDATED: &str = "car.updated";
    /// A car was removed from the fleet.
    pub const CAR_DELETED: &str = "car.deleted";
    /// A booking was placed.
    pub const BOOKING_CREATED: &str = "booking.created";
    /// A booking changed dates or status.
    pub const BOOKING_UPDATED: &str = "booking.updated";
    /// A booking was cancelled.
    pub const BOOKING_CANCELLED: &str = "booking.cancelled";
    /// A review was published.
    pub const REVIEW_CREATED: &str = "review.created";
}

/// One named cache domain and the events that invalidate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Short name used in logs and admin output.
    pub name: String,
    /// Time-to-live applied at write time.
    pub ttl_seconds: u64,
    /// Prefix every key of this domain starts with, usually ending in `:`.
    pub key_prefix: String,
    /// Domain events that invalidate every key under the prefix.
    pub invalidation_events: Vec<String>,
}

impl CacheConfig {
    /// Creates a cache domain declaration.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        ttl_seconds: u64,
        key_prefix: impl Into<String>,
        invalidation_events: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            ttl_seconds,
            key_prefix: key_prefix.into(),
            invalidation_events: invalidation_events
                .iter()
                .map(|event| (*event).to_owned())
                .collect(),
        }
    }

    /// Returns whether the event invalidates this domain.
    #[must_use]
    pub fn matches_event(&self, event: &str) -> bool {
        self.invalidation_events
            .iter()
            .any(|candidate| candidate == event)
    }

    /// Builds a key inside this domain.
    #[must_use]
    pub fn key(&self, parts: &[&str]) -> String {
        cache_key(self.key_prefix.as_str(), parts)
    }

    /// Glob matching every key of this domain.
    #[must_use]
    pub fn invalidation_pattern(&self) -> String {
        format!("{}*", self.key_prefix)
    }
}

/// Built-in cache domains of the rental backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheCatalog {
    /// Full fleet listing.
    pub fleet: CacheConfig,
    /// One car's detail payload.
    pub car_details: CacheConfig,
    /// Per-car, per-day availability.
    pub availability: CacheConfig,
    /// A user's bookings.
    pub bookings: CacheConfig,
    /// Published reviews.
    pub reviews: CacheConfig,
}

impl CacheCatalog {
    /// Returns every domain in the catalog.
    #[must_use]
    pub fn all(&self) -> Vec<CacheConfig> {
        vec![
            self.fleet.clone(),
            self.car_details.clone(),
            self.availability.clone(),
            self.bookings.clone(),
            self.reviews.clone(),
        ]
    }
}

impl Default for CacheCatalog {
    fn default() -> Self {
        Self {
            fleet: CacheConfig::new(
                "fleet",
                300,
                "fleet:",
                &[events::CAR_CREATED, events::CAR_UPDATED, events::CAR_DELETED],
            ),
            car_details: CacheConfig::new(
                "car_details",
                600,
                "car:",
                &[events::CAR_UPDATED, events::CAR_DELETED],
            ),
            availability: CacheConfig::new(
                "availability",
                60,
                "availability:",
                &[
                    events::BOOKING_CREATED,
                    events::BOOKING_UPDATED,
                    events::BOOKING_CANCELLED,
                    events::CAR_DELETED,
                ],
            ),
            bookings: CacheConfig::new(
                "bookings",
                120,
                "bookings:",
                &[
                    events::BOOKING_CREATED,
                    events::BOOKING_UPDATED,
                    events::BOOKING_CANCELLED,
                ],
            ),
            reviews: CacheConfig::new("reviews", 900, "reviews:", &[events::REVIEW_CREATED]),
        }
    }
}

/// Composes `prefix + parts.join(":")`.
///
/// Producers and invalidators both go through this so they agree on key shape.
#[must_use]
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    format!("{prefix}{}", parts.join(":"))
}

/// Glob matching every key that carries `tag` as an inner segment.
#[must_use]
pub fn tag_pattern(tag: &str) -> String {
    format!("*:{tag}:*")
}
