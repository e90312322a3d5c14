use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

use crate::dto::MeResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub async fn me_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<MeResponse>> {
    let identity = state.identity.resolve(&headers).await?;

    Ok(Json(MeResponse {
        subject: identity.subject().to_owned(),
        email: identity.email().map(str::to_owned),
        roles: identity.roles().to_vec(),
    }))
}
