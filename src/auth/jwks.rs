//! Cached public signing keys for Firebase ID tokens.

use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::DecodingKey;
use reqwest::header::CACHE_CONTROL;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AuthError;

/// Google's JWKS endpoint for Firebase Auth ID token signing keys.
pub const FIREBASE_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Key lifetime used when the response carries no `max-age`.
pub const DEFAULT_KEY_MAX_AGE: Duration = Duration::from_secs(3600);

struct CachedKeys {
    keys: JwkSet,
    fetched_at: Instant,
    max_age: Duration,
}

impl CachedKeys {
    fn is_stale(&self) -> bool {
        self.fetched_at.elapsed() >= self.max_age
    }
}

/// Fetches and caches a JSON Web Key Set.
///
/// Keys are refetched once the cached set is older than the `max-age` the
/// provider advertised. A key id missing from a fresh set is rejected without
/// refetching, so forged `kid` values cannot force network traffic.
pub struct JwksCache {
    http: reqwest::Client,
    url: String,
    state: RwLock<Option<CachedKeys>>,
}

impl JwksCache {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            state: RwLock::new(None),
        }
    }

    /// URL the key set is fetched from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Resolve the decoding key for a key id.
    pub async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        {
            let guard = self.state.read().await;
            if let Some(cached) = guard.as_ref().filter(|c| !c.is_stale()) {
                return decoding_key(&cached.keys, kid);
            }
        }

        let fresh = self.fetch().await?;
        let key = decoding_key(&fresh.keys, kid);
        *self.state.write().await = Some(fresh);
        key
    }

    async fn fetch(&self) -> Result<CachedKeys, AuthError> {
        debug!(url = %self.url, "Fetching signing keys");

        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::KeyFetch(format!("key endpoint returned {}", status)));
        }

        let max_age = response
            .headers()
            .get(CACHE_CONTROL)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_max_age)
            .unwrap_or(DEFAULT_KEY_MAX_AGE);

        let keys: JwkSet = response
            .json()
            .await
            .map_err(|e| AuthError::KeyFetch(e.to_string()))?;

        Ok(CachedKeys {
            keys,
            fetched_at: Instant::now(),
            max_age,
        })
    }
}

fn decoding_key(keys: &JwkSet, kid: &str) -> Result<DecodingKey, AuthError> {
    let jwk = keys
        .find(kid)
        .ok_or_else(|| AuthError::InvalidToken(format!("unknown key id: {}", kid)))?;
    DecodingKey::from_jwk(jwk).map_err(|e| AuthError::KeyFetch(e.to_string()))
}

/// Parse the `max-age` directive of a `Cache-Control` header value.
pub(crate) fn parse_max_age(value: &str) -> Option<Duration> {
    value.split(',').find_map(|directive| {
        let (name, seconds) = directive.trim().split_once('=')?;
        if name.trim().eq_ignore_ascii_case("max-age") {
            seconds.trim().parse::<u64>().ok().map(Duration::from_secs)
        } else {
            None
        }
    })
}
