//! Rental fleet records served through the cache.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A rentable car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Stable car identifier.
    pub id: String,
    /// Display name, e.g. make and model.
    pub name: String,
    /// Category such as `suv` or `compact`.
    pub category: String,
    /// Daily rate in minor currency units.
    pub daily_rate_cents: i64,
    /// Pickup location.
    pub location: String,
}

/// A confirmed booking of one car over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier.
    pub id: String,
    /// Booked car.
    pub car_id: String,
    /// Subject of the user who booked.
    pub user_id: String,
    /// First rental day.
    pub start_date: NaiveDate,
    /// Last rental day.
    pub end_date: NaiveDate,
    /// When the booking was placed.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Returns whether the booking occupies the car on `date`.
    #[must_use]
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Availability of one car on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayAvailability {
    /// Car identifier.
    pub car_id: String,
    /// Calendar day.
    pub date: NaiveDate,
    /// Whether no booking covers the day.
    pub available: bool,
}
