use thiserror::Error;

/// Errors raised while authenticating a bearer token
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// No `Authorization: Bearer <token>` header on the request
    #[error("Missing or malformed bearer token")]
    MissingToken,

    /// Token failed signature, expiry, audience or claim checks
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Public signing keys could not be fetched from the identity provider
    #[error("Failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

/// Errors from the document store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Record identifier is not a valid ObjectId
    #[error("Invalid project id: {0}")]
    InvalidId(String),

    /// Client construction or connectivity failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The database rejected or failed the operation
    #[error("Query error: {0}")]
    Query(String),

    /// A stored record could not be converted to or from its document form
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors from the hosted image-editing model
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// Image or prompt missing from the request (should map to HTTP 400)
    #[error("Image and prompt are required")]
    MissingInput,

    /// Transport-level failure talking to the provider
    #[error("Request error: {0}")]
    Request(String),

    /// Prediction did not reach a terminal state in time
    #[error("Prediction timed out after {waited_secs}s")]
    Timeout { waited_secs: u64 },

    /// Provider answered with a non-success HTTP status
    #[error("Provider returned {status}: {detail}")]
    Provider { status: u16, detail: String },

    /// Prediction finished without succeeding
    #[error("Prediction {status}: {}", .error.as_deref().unwrap_or("no detail"))]
    PredictionFailed {
        status: String,
        error: Option<String>,
    },

    /// Provider response did not have the expected shape
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Project operation being served when a store error occurred.
///
/// Each operation carries the fixed status and message returned to the caller,
/// so store failures never leak diagnostic detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    List,
    Get,
    Create,
    Update,
    Delete,
}

impl StoreOperation {
    /// Short message returned to the client when this operation fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            StoreOperation::List => "Error getting projects",
            StoreOperation::Get => "Error getting project",
            StoreOperation::Create => "Error creating project",
            StoreOperation::Update => "Error updating project",
            StoreOperation::Delete => "Error deleting project",
        }
    }

    /// HTTP status code returned when this operation fails.
    pub fn failure_status(&self) -> u16 {
        match self {
            StoreOperation::List => 500,
            _ => 400,
        }
    }
}

/// Errors surfaced by the project and AI routes
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// Project does not exist or belongs to another principal
    #[error("Project not found")]
    NotFound,

    /// Request body failed validation
    #[error("{0}")]
    Validation(String),

    /// Store operation failed
    #[error("{}: {source}", .operation.failure_message())]
    Store {
        operation: StoreOperation,
        source: StoreError,
    },

    /// Image-editing call failed
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

impl ApiError {
    /// Wrap a store error with the operation it interrupted.
    pub fn store(operation: StoreOperation) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { operation, source }
    }
}
