use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use fleetgate_core::{AppError, UserIdentity};
use tracing::error;

use crate::error::ApiResult;

/// Admits callers holding the admin role. Must run after `authenticate`.
pub async fn require_admin(request: Request, next: Next) -> ApiResult<Response> {
    let Some(identity) = request.extensions().get::<UserIdentity>() else {
        error!(
            path = %request.uri().path(),
            "require_admin reached without an authenticated identity"
        );
        return Err(AppError::Internal(
            "admin check is mounted without authentication".to_owned(),
        )
        .into());
    };

    if !identity.is_admin() {
        return Err(AppError::Forbidden(format!(
            "subject '{}' is not an administrator",
            identity.subject()
        ))
        .into());
    }

    Ok(next.run(request).await)
}
