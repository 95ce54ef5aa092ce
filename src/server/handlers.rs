//! HTTP request handlers for the project and image-editing API.
//!
//! # Endpoints
//!
//! - `GET /projects` - List the caller's projects, newest first
//! - `GET /projects/{id}` - Fetch one project
//! - `POST /projects` - Create a project
//! - `PUT /projects/{id}` - Update whitelisted fields of a project
//! - `DELETE /projects/{id}` - Delete a project
//! - `POST /projects/ai/process` - Edit an image with the inference provider
//!
//! All handlers run behind the authentication middleware and take the
//! caller's [`Principal`] as an extractor.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::auth::Principal;
use crate::error::{ApiError, InferenceError, StoreError, StoreOperation};
use crate::inference::{validate_input, ImageEditor};
use crate::store::{NewProject, Project, ProjectPatch, ProjectStore};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state passed to every handler.
pub struct AppState<S: ProjectStore, E: ImageEditor> {
    /// Project persistence
    pub store: Arc<S>,

    /// Image-editing provider
    pub editor: Arc<E>,
}

impl<S: ProjectStore, E: ImageEditor> AppState<S, E> {
    pub fn new(store: S, editor: E) -> Self {
        Self {
            store: Arc::new(store),
            editor: Arc::new(editor),
        }
    }
}

impl<S: ProjectStore, E: ImageEditor> Clone for AppState<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            editor: Arc::clone(&self.editor),
        }
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of `POST /projects`.
///
/// Only the name is read; owner and creation time are set by the server.
#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: Option<String>,
}

/// Body of `POST /projects/ai/process`.
#[derive(Debug, Deserialize)]
pub struct ProcessImageRequest {
    /// Base64-encoded source image, passed to the provider unchanged
    #[serde(default, rename = "imageBase64")]
    pub image_base64: Option<String>,

    #[serde(default)]
    pub prompt: Option<String>,
}

/// `{"message": ...}` body used for acknowledgements and errors alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response from `POST /projects`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    /// Identifier assigned by the store
    pub id: String,
}

/// Response from `POST /projects/ai/process`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    /// URL of the edited image
    pub result: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert ApiError to an HTTP response.
///
/// Clients only ever see the short message; store and provider detail is
/// logged here instead:
/// - 5xx errors are logged at ERROR level
/// - 404 at DEBUG level
/// - other 4xx errors at WARN level
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message): (StatusCode, &str, String) = match &self {
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Project not found".to_string(),
            ),

            ApiError::Validation(message) => {
                (StatusCode::BAD_REQUEST, "validation_error", message.clone())
            }

            ApiError::Store {
                operation,
                source: StoreError::InvalidId(_),
            } => (
                StatusCode::BAD_REQUEST,
                "invalid_id",
                operation.failure_message().to_string(),
            ),

            ApiError::Store { operation, .. } => (
                StatusCode::from_u16(operation.failure_status())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "store_error",
                operation.failure_message().to_string(),
            ),

            ApiError::Inference(InferenceError::MissingInput) => (
                StatusCode::BAD_REQUEST,
                "missing_input",
                InferenceError::MissingInput.to_string(),
            ),

            ApiError::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "inference_error",
                "Error processing image".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Not found: {}",
                self
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self
            );
        }

        (status, Json(MessageResponse::new(message))).into_response()
    }
}

// =============================================================================
// Project Handlers
// =============================================================================

/// Map an unreadable JSON body to the route's failure message.
fn rejected_body(operation: StoreOperation, rejection: JsonRejection) -> ApiError {
    debug!(status = rejection.status().as_u16(), "Rejected body: {}", rejection.body_text());
    ApiError::Validation(operation.failure_message().to_string())
}

/// Handle `GET /projects`.
///
/// # Response
///
/// - `200 OK`: JSON array of the caller's projects, newest first
/// - `500 Internal Server Error`: `{"message": "Error getting projects"}`
pub async fn list_projects_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = state
        .store
        .list(&principal.email)
        .await
        .map_err(ApiError::store(StoreOperation::List))?;

    debug!(owner = %principal.email, count = projects.len(), "Listed projects");
    Ok(Json(projects))
}

/// Handle `GET /projects/{id}`.
///
/// Projects owned by someone else are reported as not found.
///
/// # Response
///
/// - `200 OK`: the project
/// - `404 Not Found`: `{"message": "Project not found"}`
/// - `400 Bad Request`: `{"message": "Error getting project"}`
pub async fn get_project_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<Project>, ApiError> {
    state
        .store
        .get_by_id(&id, &principal.email)
        .await
        .map_err(ApiError::store(StoreOperation::Get))?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Handle `POST /projects`.
///
/// # Request
///
/// ```json
/// { "name": "My project" }
/// ```
///
/// # Response
///
/// - `201 Created`: `{"id": "<hex id>"}`
/// - `400 Bad Request`: missing name, malformed body or store failure
pub async fn create_project_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
    body: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let Json(request) = body.map_err(|e| rejected_body(StoreOperation::Create, e))?;

    let project = NewProject::new(request.name.as_deref(), &principal.email)?;
    let id = state
        .store
        .insert(project)
        .await
        .map_err(ApiError::store(StoreOperation::Create))?;

    info!(project_id = %id, owner = %principal.email, "Project created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Handle `PUT /projects/{id}`.
///
/// The body is a partial object of updatable fields. Unknown and protected
/// fields are rejected before the store is touched. An id that matches no
/// owned project still answers `200`.
///
/// # Response
///
/// - `200 OK`: `{"message": "Project updated"}`
/// - `400 Bad Request`: invalid patch, invalid id or store failure
pub async fn update_project_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(body) = body.map_err(|e| rejected_body(StoreOperation::Update, e))?;
    let patch = ProjectPatch::from_json(body)?;

    let matched = state
        .store
        .update_by_id(&id, &principal.email, &patch)
        .await
        .map_err(ApiError::store(StoreOperation::Update))?;

    if matched {
        info!(project_id = %id, "Project updated");
    } else {
        debug!(project_id = %id, owner = %principal.email, "Update matched no project");
    }

    Ok(Json(MessageResponse::new("Project updated")))
}

/// Handle `DELETE /projects/{id}`.
///
/// An id that matches no owned project still answers `200`.
///
/// # Response
///
/// - `200 OK`: `{"message": "Project deleted"}`
/// - `400 Bad Request`: invalid id or store failure
pub async fn delete_project_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let deleted = state
        .store
        .delete_by_id(&id, &principal.email)
        .await
        .map_err(ApiError::store(StoreOperation::Delete))?;

    if deleted {
        info!(project_id = %id, "Project deleted");
    } else {
        debug!(project_id = %id, owner = %principal.email, "Delete matched no project");
    }

    Ok(Json(MessageResponse::new("Project deleted")))
}

// =============================================================================
// Image Editing
// =============================================================================

/// Handle `POST /projects/ai/process`.
///
/// # Request
///
/// ```json
/// { "imageBase64": "data:image/png;base64,...", "prompt": "add a hat" }
/// ```
///
/// # Response
///
/// - `200 OK`: `{"result": "<url of edited image>"}`
/// - `400 Bad Request`: `{"message": "Image and prompt are required"}`
/// - `500 Internal Server Error`: `{"message": "Error processing image"}`
pub async fn process_image_handler<S: ProjectStore, E: ImageEditor>(
    State(state): State<AppState<S, E>>,
    principal: Principal,
    body: Result<Json<ProcessImageRequest>, JsonRejection>,
) -> Result<Json<ProcessImageResponse>, ApiError> {
    // Unparseable bodies carry no usable input either
    let Json(request) = body.map_err(|_| InferenceError::MissingInput)?;
    let (image, prompt) = validate_input(request.image_base64.as_deref(), request.prompt.as_deref())?;

    info!(
        uid = %principal.uid,
        image_len = image.len(),
        prompt_len = prompt.len(),
        "Processing image edit"
    );

    let result = state.editor.process(image, prompt).await?;

    debug!(uid = %principal.uid, result = %result, "Image edit completed");
    Ok(Json(ProcessImageResponse { result }))
}
