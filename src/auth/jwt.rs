//! JWT-based token verification.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};

use super::jwks::{JwksCache, FIREBASE_JWKS_URL};
use super::{Principal, TokenClaims, TokenVerifier};
use crate::error::AuthError;

/// Issuer prefix of Firebase ID tokens; the project id follows it.
pub const FIREBASE_ISSUER_PREFIX: &str = "https://securetoken.google.com/";

/// Clock skew tolerance in seconds.
const LEEWAY_SECS: u64 = 30;

enum VerificationKeys {
    /// Symmetric secret (HS256)
    Shared(DecodingKey),
    /// Provider key set selected by `kid` (RS256)
    Remote(JwksCache),
}

/// Verifies JWT bearer tokens.
pub struct JwtVerifier {
    keys: VerificationKeys,
    validation: Validation,
}

impl JwtVerifier {
    /// Verify Firebase ID tokens for the given project.
    pub fn firebase(project_id: &str, http: reqwest::Client) -> Self {
        Self::firebase_with_jwks_url(project_id, http, FIREBASE_JWKS_URL)
    }

    /// Verify Firebase-style ID tokens against a custom key set URL.
    pub fn firebase_with_jwks_url(
        project_id: &str,
        http: reqwest::Client,
        jwks_url: impl Into<String>,
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.leeway = LEEWAY_SECS;
        validation.set_audience(&[project_id]);
        validation.set_issuer(&[format!("{}{}", FIREBASE_ISSUER_PREFIX, project_id)]);
        validation.set_required_spec_claims(&["exp", "sub", "aud", "iss"]);

        Self {
            keys: VerificationKeys::Remote(JwksCache::new(http, jwks_url)),
            validation,
        }
    }

    /// Verify HS256 tokens signed with a shared secret.
    ///
    /// Intended for local development; see [`issue_token`].
    pub fn with_secret(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = LEEWAY_SECS;
        validation.validate_aud = false;

        Self {
            keys: VerificationKeys::Shared(DecodingKey::from_secret(secret.as_ref())),
            validation,
        }
    }

    /// Name of the verification mode (for logging).
    pub fn mode(&self) -> &'static str {
        match self.keys {
            VerificationKeys::Shared(_) => "shared-secret (HS256)",
            VerificationKeys::Remote(_) => "firebase (RS256)",
        }
    }

    /// URL signing keys are fetched from, if verification uses a remote key set.
    pub fn key_source(&self) -> Option<&str> {
        match &self.keys {
            VerificationKeys::Shared(_) => None,
            VerificationKeys::Remote(cache) => Some(cache.url()),
        }
    }

    async fn resolve_key(&self, header: &Header) -> Result<DecodingKey, AuthError> {
        match &self.keys {
            VerificationKeys::Shared(key) => Ok(key.clone()),
            VerificationKeys::Remote(cache) => {
                let kid = header
                    .kid
                    .as_deref()
                    .ok_or_else(|| AuthError::InvalidToken("missing key id".to_string()))?;
                cache.key_for(kid).await
            }
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<Principal, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        let key = self.resolve_key(&header).await?;

        let data = decode::<TokenClaims>(token, &key, &self.validation).map_err(|e| match e
            .kind()
        {
            ErrorKind::ExpiredSignature => AuthError::InvalidToken("token expired".to_string()),
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        data.claims.into_principal()
    }
}

/// Mint an HS256 token accepted by [`JwtVerifier::with_secret`].
///
/// Returns the token and its expiry timestamp (Unix seconds).
pub fn issue_token(
    secret: impl AsRef<[u8]>,
    uid: &str,
    email: &str,
    ttl: Duration,
) -> Result<(String, i64), AuthError> {
    let now = Utc::now().timestamp();
    let exp = i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| {
            AuthError::InvalidToken(format!("lifetime of {}s is out of range", ttl.as_secs()))
        })?;

    let claims = TokenClaims {
        sub: uid.to_string(),
        email: Some(email.to_string()),
        email_verified: true,
        name: None,
        exp,
        iat: now,
    };

    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

    Ok((token, exp))
}
