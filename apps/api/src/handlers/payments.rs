use axum::Json;
use axum::http::StatusCode;
use fleetgate_core::AppError;

use crate::dto::{AcceptedResponse, PaymentRequest};
use crate::error::ApiResult;

/// Acknowledges a payment attempt; settlement happens with the provider.
pub async fn create_payment_handler(
    Json(payload): Json<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    if payload.amount_cents <= 0 {
        return Err(AppError::Validation("amount_cents must be positive".to_owned()).into());
    }
    if payload.booking_id.trim().is_empty() {
        return Err(AppError::Validation("booking_id is required".to_owned()).into());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            status: "accepted",
            reference: payload.booking_id,
        }),
    ))
}
