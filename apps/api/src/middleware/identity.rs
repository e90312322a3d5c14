use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use fleetgate_application::TokenVerifier;
use fleetgate_core::{AppError, AppResult, UserIdentity};
use tracing::debug;

use crate::error::ApiResult;

/// Resolves callers from `Authorization: Bearer` headers.
#[derive(Clone)]
pub struct IdentityResolver {
    verifier: Arc<dyn TokenVerifier>,
}

impl IdentityResolver {
    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    pub async fn resolve(&self, headers: &HeaderMap) -> AppResult<UserIdentity> {
        let token = bearer_token(headers)
            .ok_or_else(|| AppError::Unauthorized("bearer token required".to_owned()))?;

        self.verifier.verify(token).await
    }

    /// Subject of a valid bearer token; `None` when absent or invalid.
    pub async fn user_id_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        bearer_token(headers)?;

        match self.resolve(headers).await {
            Ok(identity) => Some(identity.subject().to_owned()),
            Err(error) => {
                debug!(error = %error, "ignoring unverifiable bearer token");
                None
            }
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn authenticate(
    State(resolver): State<IdentityResolver>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let identity = resolver.resolve(request.headers()).await?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
