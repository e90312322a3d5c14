use axum::Json;
use axum::body::Bytes;
use axum::http::StatusCode;
use fleetgate_core::AppError;

use crate::dto::UploadResponse;
use crate::error::ApiResult;

pub async fn upload_handler(body: Bytes) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if body.is_empty() {
        return Err(AppError::Validation("upload body must not be empty".to_owned()).into());
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            status: "accepted",
            received_bytes: body.len(),
        }),
    ))
}
