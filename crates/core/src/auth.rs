use serde::{Deserialize, Serialize};

/// Role name that grants access to operational endpoints.
pub const ADMIN_ROLE: &str = "admin";

/// Authenticated caller resolved from a bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    subject: String,
    email: Option<String>,
    roles: Vec<String>,
}

impl UserIdentity {
    /// Creates a user identity from verified token claims.
    #[must_use]
    pub fn new(subject: impl Into<String>, email: Option<String>, roles: Vec<String>) -> Self {
        Self {
            subject: subject.into(),
            email,
            roles,
        }
    }

    /// Returns the stable subject claim from the identity provider.
    #[must_use]
    pub fn subject(&self) -> &str {
        self.subject.as_str()
    }

    /// Returns the email, if the provider returned one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the roles granted to the caller.
    #[must_use]
    pub fn roles(&self) -> &[String] {
        self.roles.as_slice()
    }

    /// Returns whether the caller holds the admin role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|role| role == ADMIN_ROLE)
    }
}
