//! HTTP server layer for the NotesAI API.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │            /projects, /projects/{id}, /projects/ai/process      │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │    auth     │─▶│  handlers   │  │        routes           │  │
//! │  │  (bearer)   │  │ (requests)  │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                 │                    │
//!            ▼                 ▼                    ▼
//!      TokenVerifier     ProjectStore          ImageEditor
//! ```

pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::{auth_middleware, bearer_token, INVALID_TOKEN_MESSAGE, UNAUTHENTICATED_MESSAGE};
pub use handlers::{
    create_project_handler, delete_project_handler, get_project_handler, list_projects_handler,
    process_image_handler, update_project_handler, AppState, CreateProjectRequest,
    CreatedResponse, MessageResponse, ProcessImageRequest, ProcessImageResponse,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_BODY_SIZE};
