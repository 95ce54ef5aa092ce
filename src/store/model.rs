//! Project records and the request shapes that create or change them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Fields a client may change through `PUT /projects/{id}`.
pub const UPDATABLE_FIELDS: &[&str] = &["name", "description", "imageUrl", "resultUrl", "prompt"];

/// Fields owned by the server; any attempt to write them is rejected.
pub const PROTECTED_FIELDS: &[&str] = &["_id", "id", "ownerEmail", "createdAt"];

/// A stored project as returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Store-assigned identifier (hex ObjectId)
    #[serde(rename = "_id")]
    pub id: String,

    pub name: String,

    /// Server-assigned creation time
    pub created_at: DateTime<Utc>,

    /// Email of the principal that created the project
    pub owner_email: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Source image the project works on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// Last image produced by the inference provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    /// Last prompt sent to the inference provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Project {
    /// Overwrite the fields present in `patch`.
    pub fn apply(&mut self, patch: &ProjectPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(description) = &patch.description {
            self.description = Some(description.clone());
        }
        if let Some(image_url) = &patch.image_url {
            self.image_url = Some(image_url.clone());
        }
        if let Some(result_url) = &patch.result_url {
            self.result_url = Some(result_url.clone());
        }
        if let Some(prompt) = &patch.prompt {
            self.prompt = Some(prompt.clone());
        }
    }
}

/// A project about to be inserted.
///
/// Owner and creation time always come from the server, never the request body.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub name: String,
    pub owner_email: String,
    pub created_at: DateTime<Utc>,
}

impl NewProject {
    /// Build a new project owned by `owner_email`, stamped with the current time.
    pub fn new(name: Option<&str>, owner_email: &str) -> Result<Self, ApiError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::Validation("Project name is required".to_string()))?;

        Ok(Self {
            name: name.to_string(),
            owner_email: owner_email.to_string(),
            created_at: Utc::now(),
        })
    }
}

/// Validated partial update for a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl ProjectPatch {
    /// Validate an arbitrary JSON body into a patch.
    ///
    /// Rejects non-object bodies, protected or unknown fields, non-string
    /// values, an empty patch and a blank name.
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        let fields = match body {
            Value::Object(fields) => fields,
            _ => return Err(invalid("Request body must be a JSON object")),
        };

        if let Some(field) = fields
            .keys()
            .find(|k| PROTECTED_FIELDS.contains(&k.as_str()))
        {
            return Err(invalid(format!("Field '{}' cannot be modified", field)));
        }

        if let Some(field) = fields
            .keys()
            .find(|k| !UPDATABLE_FIELDS.contains(&k.as_str()))
        {
            return Err(invalid(format!("Unknown field '{}'", field)));
        }

        let patch: ProjectPatch = serde_json::from_value(Value::Object(fields))
            .map_err(|e| invalid(format!("Invalid update: {}", e)))?;

        if patch.is_empty() {
            return Err(invalid("No fields to update"));
        }

        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(invalid("Project name cannot be empty"));
        }

        Ok(patch)
    }

    /// True when no field would change.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.result_url.is_none()
            && self.prompt.is_none()
    }
}

fn invalid(message: impl Into<String>) -> ApiError {
    ApiError::Validation(message.into())
}
