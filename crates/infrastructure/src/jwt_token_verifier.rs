use async_trait::async_trait;
use fleetgate_application::TokenVerifier;
use fleetgate_core::{AppError, AppResult, UserIdentity};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by bearer tokens of the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerClaims {
    /// Subject (user id).
    pub sub: String,
    /// Optional email.
    #[serde(default)]
    pub email: Option<String>,
    /// Granted roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

/// HS256 bearer-token verifier.
#[derive(Clone)]
pub struct JwtTokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtTokenVerifier {
    /// Creates a verifier for tokens signed with `secret`.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtTokenVerifier {
    async fn verify(&self, token: &str) -> AppResult<UserIdentity> {
        let data = decode::<BearerClaims>(token, &self.key, &self.validation)
            .map_err(|error| AppError::Unauthorized(format!("invalid bearer token: {error}")))?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized(
                "bearer token has an empty subject".to_owned(),
            ));
        }

        Ok(UserIdentity::new(claims.sub, claims.email, claims.roles))
    }
}
