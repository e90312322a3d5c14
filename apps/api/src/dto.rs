use std::collections::BTreeMap;

use chrono::NaiveDate;
use fleetgate_domain::RateLimitViolation;
use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
}

/// Authenticated caller.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub subject: String,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

/// Availability lookup: one day, or `days` days starting today.
#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub date: Option<NaiveDate>,
    pub days: Option<u32>,
}

/// Incoming booking payload.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub car_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Incoming payment payload.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: String,
    pub amount_cents: i64,
}

/// Acknowledgement for accepted asynchronous work.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    pub status: &'static str,
    pub reference: String,
}

/// Acknowledgement for an accepted upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub received_bytes: usize,
}

/// Paging for the violation log.
#[derive(Debug, Default, Deserialize)]
pub struct ViolationsQuery {
    pub limit: Option<usize>,
}

/// Recent rate-limit violations.
#[derive(Debug, Serialize)]
pub struct ViolationsResponse {
    pub capacity: usize,
    pub total: usize,
    pub by_endpoint: BTreeMap<String, usize>,
    pub violations: Vec<RateLimitViolation>,
}

/// Clears one identifier's window under a named policy.
#[derive(Debug, Deserialize)]
pub struct ResetRateLimitRequest {
    pub policy: String,
    pub identifier: String,
}

/// Result of a reset.
#[derive(Debug, Serialize)]
pub struct ResetRateLimitResponse {
    pub policy: String,
    pub identifier: String,
    pub reset: bool,
}

/// Overrides for an on-demand warming run.
#[derive(Debug, Default, Deserialize)]
pub struct WarmCacheRequest {
    pub popular_limit: Option<usize>,
    pub days_ahead: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub batch_size: Option<usize>,
}

/// Invalidation by pattern, tags or domain event.
#[derive(Debug, Default, Deserialize)]
pub struct InvalidateCacheRequest {
    pub pattern: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub event: Option<String>,
}

/// Number of removed cache keys.
#[derive(Debug, Serialize)]
pub struct InvalidateCacheResponse {
    pub removed: u64,
}

/// Domain event emitted by an admin action.
#[derive(Debug, Serialize)]
pub struct EventResponse {
    pub event: &'static str,
    pub removed: u64,
}
