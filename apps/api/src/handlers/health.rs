use axum::Json;
use axum::extract::State;

use crate::dto::HealthResponse;
use crate::state::AppState;

pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = if state.rate_limit_service.is_available().await {
        "available"
    } else {
        "unavailable"
    };

    Json(HealthResponse {
        status: "ok",
        store,
    })
}
