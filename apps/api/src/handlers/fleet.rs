use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use chrono::Days;
use fleetgate_core::AppError;
use fleetgate_domain::{Car, DayAvailability};

use crate::dto::AvailabilityQuery;
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_AVAILABILITY_DAYS: u32 = 7;
const MAX_AVAILABILITY_DAYS: u32 = 90;

pub async fn list_fleet_handler(State(state): State<AppState>) -> Json<Vec<Car>> {
    Json(state.fleet.cars().await)
}

pub async fn car_details_handler(
    State(state): State<AppState>,
    Path(car_id): Path<String>,
) -> ApiResult<Json<Car>> {
    let car = state
        .fleet
        .car(car_id.as_str())
        .await
        .ok_or_else(|| AppError::NotFound(format!("car '{car_id}' does not exist")))?;

    Ok(Json(car))
}

pub async fn car_availability_handler(
    State(state): State<AppState>,
    Path(car_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> ApiResult<Response> {
    if let Some(date) = query.date {
        let day = state.fleet.day_availability(car_id.as_str(), date).await?;
        return Ok(Json(day).into_response());
    }

    let days = query.days.unwrap_or(DEFAULT_AVAILABILITY_DAYS);
    if days == 0 || days > MAX_AVAILABILITY_DAYS {
        return Err(AppError::Validation(format!(
            "days must be between 1 and {MAX_AVAILABILITY_DAYS}"
        ))
        .into());
    }

    let today = state.clock.now().date_naive();
    let mut schedule: Vec<DayAvailability> = Vec::new();
    for offset in 0..days {
        let Some(date) = today.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        schedule.push(state.fleet.day_availability(car_id.as_str(), date).await?);
    }

    Ok(Json(schedule).into_response())
}
