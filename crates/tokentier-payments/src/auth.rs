//! Request Authentication

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// The user behind an access token
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Resolves access tokens to users
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Fails with [`PaymentError::Unauthenticated`] for unknown or expired tokens
    async fn authenticate(&self, access_token: &str) -> Result<AuthUser>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
/// The scheme name is case-insensitive.
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    header
        .and_then(|value| value.trim_start().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim())
        .filter(|token| !token.is_empty())
        .ok_or(PaymentError::Unauthenticated)
}
