//! Bearer token authentication middleware.
//!
//! Every project route sits behind [`auth_middleware`]. The middleware pulls
//! the token out of the `Authorization` header, verifies it with the
//! configured [`TokenVerifier`], and stores the resulting [`Principal`] in the
//! request extensions. Handlers then take the principal as an extractor:
//!
//! ```ignore
//! async fn handler(principal: Principal) -> String {
//!     principal.email
//! }
//! ```
//!
//! Rejected requests never reach a handler, so no store or provider call is
//! made for them.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{debug, error};

use super::handlers::MessageResponse;
use crate::auth::{Principal, TokenVerifier};
use crate::error::AuthError;

/// Message returned when no bearer token is presented.
pub const UNAUTHENTICATED_MESSAGE: &str = "No autorizado";

/// Message returned when a presented token fails verification.
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid token";

const BEARER_PREFIX: &str = "Bearer ";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (error_type, message) = match &self {
            AuthError::MissingToken => ("missing_token", UNAUTHENTICATED_MESSAGE),
            AuthError::InvalidToken(_) => ("invalid_token", INVALID_TOKEN_MESSAGE),
            AuthError::KeyFetch(_) => ("key_fetch_failed", INVALID_TOKEN_MESSAGE),
        };
        let status = StatusCode::UNAUTHORIZED;

        // Key fetch failures are on our side; everything else is the caller's
        match &self {
            AuthError::KeyFetch(_) => {
                error!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication unavailable: {}",
                    self
                );
            }
            _ => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authentication failed: {}",
                    self
                );
            }
        }

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    let token = value
        .strip_prefix(BEARER_PREFIX)
        .map(str::trim)
        .ok_or(AuthError::MissingToken)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}

/// Axum middleware that authenticates every request with a bearer token.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use axum::{middleware, Router};
/// use notesai_api::auth::JwtVerifier;
/// use notesai_api::server::auth::auth_middleware;
///
/// let verifier = Arc::new(JwtVerifier::with_secret("dev-secret"));
/// let app = Router::new()
///     .route("/projects", get(handler))
///     .route_layer(middleware::from_fn_with_state(verifier, auth_middleware::<JwtVerifier>));
/// ```
pub async fn auth_middleware<V>(
    State(verifier): State<Arc<V>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    V: TokenVerifier + 'static,
{
    let token = bearer_token(request.headers())?.to_string();
    let principal = verifier.verify(&token).await?;

    debug!(uid = %principal.uid, email = %principal.email, "Authenticated request");
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Extracts the principal stored by [`auth_middleware`].
///
/// Rejects with `MissingToken` if the route was mounted without the middleware.
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
