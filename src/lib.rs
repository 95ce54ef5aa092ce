//! # NotesAI API
//!
//! Backend for the NotesAI note-taking app: authenticated CRUD over a user's
//! projects in MongoDB, plus an image-editing proxy that runs an SDXL
//! ControlNet LoRA model on Replicate.
//!
//! ## Features
//!
//! - **Bearer authentication**: Firebase ID tokens (RS256, Google JWKS) or
//!   shared-secret development tokens
//! - **Owner-scoped projects**: every project is stamped with its creator's
//!   email and only visible to them
//! - **Image editing**: base64 image + prompt in, URL of the edited image out
//!
//! ## Architecture
//!
//! - [`auth`] - Token verification and the authenticated [`Principal`]
//! - [`store`] - Project model and MongoDB access
//! - [`inference`] - Image-editing provider client
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use notesai_api::{create_router, JwtVerifier, MongoProjectStore, ReplicateClient, RouterConfig};
//! use notesai_api::inference::{InferenceSettings, DEFAULT_REPLICATE_API_URL};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoProjectStore::connect("mongodb://localhost:27017", "NotesAI", 5).await?;
//!     let editor = ReplicateClient::new("r8_...", DEFAULT_REPLICATE_API_URL, InferenceSettings::default())?;
//!     let verifier = JwtVerifier::firebase("my-project", reqwest::Client::new());
//!
//!     let router = create_router(store, editor, verifier, RouterConfig::new());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod inference;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use auth::{issue_token, JwtVerifier, Principal, TokenVerifier};
pub use config::{CheckConfig, Cli, Command, ServeConfig, TokenConfig, TokenOutputFormat};
pub use error::{ApiError, AuthError, InferenceError, StoreError, StoreOperation};
pub use inference::{ImageEditor, InferenceSettings, ReplicateClient};
pub use server::{create_router, AppState, MessageResponse, RouterConfig};
pub use store::{MongoProjectStore, NewProject, Project, ProjectPatch, ProjectStore};
