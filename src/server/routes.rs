//! Router configuration for the NotesAI API.
//!
//! This module defines the HTTP routes and applies middleware for
//! authentication, body limits, CORS and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /projects                 GET, POST          (authenticated)
//! /projects/{id}            GET, PUT, DELETE   (authenticated)
//! /projects/ai/process      POST               (authenticated)
//! ```
//!
//! CORS preflight requests are answered by the CORS layer before
//! authentication runs.
//!
//! # Example
//!
//! ```ignore
//! use notesai_api::auth::JwtVerifier;
//! use notesai_api::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_cors_origins(vec!["https://notes.example.com".to_string()]);
//!
//! let router = create_router(store, replicate, JwtVerifier::with_secret("dev"), config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::auth_middleware;
use super::handlers::{
    create_project_handler, delete_project_handler, get_project_handler, list_projects_handler,
    process_image_handler, update_project_handler, AppState,
};
use crate::auth::TokenVerifier;
use crate::inference::ImageEditor;
use crate::store::ProjectStore;

/// Default request body limit. Base64 images make bodies large.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Maximum accepted request body size in bytes
    pub max_body_size: usize,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create a router configuration with defaults.
    ///
    /// By default:
    /// - CORS allows any origin
    /// - Bodies up to 10 MiB are accepted
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            cors_origins: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Set the request body limit in bytes.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Every route requires a bearer token accepted by `verifier`. Requests that
/// fail authentication never reach `store` or `editor`.
pub fn create_router<S, E, V>(store: S, editor: E, verifier: V, config: RouterConfig) -> Router
where
    S: ProjectStore + 'static,
    E: ImageEditor + 'static,
    V: TokenVerifier + 'static,
{
    let app_state = AppState::new(store, editor);
    let verifier = Arc::new(verifier);
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route(
            "/projects",
            get(list_projects_handler::<S, E>).post(create_project_handler::<S, E>),
        )
        .route("/projects/ai/process", post(process_image_handler::<S, E>))
        .route(
            "/projects/{id}",
            get(get_project_handler::<S, E>)
                .put(update_project_handler::<S, E>)
                .delete(delete_project_handler::<S, E>),
        )
        .route_layer(middleware::from_fn_with_state(
            verifier,
            auth_middleware::<V>,
        ))
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}
