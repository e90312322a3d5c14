use axum::Json;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use fleetgate_core::UserIdentity;
use fleetgate_domain::{Booking, events};
use tracing::info;
use uuid::Uuid;

use crate::dto::CreateBookingRequest;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn create_booking_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingRequest>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let identity = state.identity.resolve(&headers).await?;

    let booking = state
        .fleet
        .add_booking(Booking {
            id: Uuid::new_v4().to_string(),
            car_id: payload.car_id,
            user_id: identity.subject().to_owned(),
            start_date: payload.start_date,
            end_date: payload.end_date,
            created_at: state.clock.now(),
        })
        .await?;

    let removed = state
        .cache_invalidator
        .handle_event(events::BOOKING_CREATED)
        .await;
    info!(
        booking_id = %booking.id,
        car_id = %booking.car_id,
        invalidated = removed,
        "booking created"
    );

    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn my_bookings_handler(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Json<Vec<Booking>> {
    Json(state.fleet.bookings_for_user(identity.subject()).await)
}
