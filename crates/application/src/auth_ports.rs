use async_trait::async_trait;

use fleetgate_core::{AppResult, UserIdentity};

/// Verifies bearer tokens issued by the external auth provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Resolves the identity behind a token or fails with `Unauthorized`.
    async fn verify(&self, token: &str) -> AppResult<UserIdentity>;
}
