use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;

use fleetgate_core::AppResult;

/// Upstream data read by warming tasks.
#[async_trait]
pub trait WarmingSource: Send + Sync {
    /// Full current fleet listing.
    async fn fleet_listing(&self) -> AppResult<Value>;

    /// Detail payload of one car, `None` when it does not exist.
    async fn car_details(&self, car_id: &str) -> AppResult<Option<Value>>;

    /// Most recently booked car ids, most popular first.
    async fn popular_car_ids(&self, limit: usize) -> AppResult<Vec<String>>;

    /// Availability of one car on one day.
    async fn availability(&self, car_id: &str, date: NaiveDate) -> AppResult<Value>;
}
