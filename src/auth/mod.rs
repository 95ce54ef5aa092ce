//! Bearer token verification.
//!
//! Every request to the API carries an `Authorization: Bearer <token>` header.
//! This module turns that opaque token into a [`Principal`]: the authenticated
//! user whose email scopes every project query.
//!
//! # Verification Modes
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     TokenVerifier trait                      │
//! └──────────────────────────────┬───────────────────────────────┘
//!                                │
//!                ┌───────────────┴───────────────┐
//!                ▼                               ▼
//!   ┌─────────────────────────┐     ┌─────────────────────────┐
//!   │  JwtVerifier::firebase  │     │ JwtVerifier::with_secret│
//!   │  RS256, Google JWKS     │     │ HS256, shared secret    │
//!   └─────────────────────────┘     └─────────────────────────┘
//! ```
//!
//! Firebase mode is used in production. The shared-secret mode exists for local
//! development and tests, with tokens minted by [`issue_token`].

mod jwks;
mod jwt;

pub use jwks::{JwksCache, DEFAULT_KEY_MAX_AGE, FIREBASE_JWKS_URL};
pub use jwt::{issue_token, JwtVerifier, FIREBASE_ISSUER_PREFIX};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Claims read from a verified token.
///
/// Matches the subset of a Firebase ID token that the API relies on; the
/// development tokens produced by [`issue_token`] use the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user id)
    pub sub: String,

    /// Email address of the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default)]
    pub email_verified: bool,

    /// Display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Expiration timestamp (Unix seconds)
    pub exp: i64,

    /// Issued at timestamp (Unix seconds)
    #[serde(default)]
    pub iat: i64,
}

impl TokenClaims {
    /// Convert verified claims into a principal.
    ///
    /// Fails when the subject is empty or the token carries no email, since the
    /// email is the ownership key for projects.
    pub fn into_principal(self) -> Result<Principal, AuthError> {
        if self.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        let email = match self.email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(AuthError::InvalidToken("token has no email".to_string())),
        };

        Ok(Principal {
            uid: self.sub,
            email,
            email_verified: self.email_verified,
            name: self.name,
        })
    }
}

/// The authenticated identity attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub uid: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
}

/// Verifies opaque bearer tokens against an identity provider.
///
/// Implementations must verify every token independently; results are never
/// cached between requests.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and return the principal it identifies.
    async fn verify(&self, token: &str) -> Result<Principal, AuthError>;
}
