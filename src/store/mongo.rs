//! MongoDB-backed project store.
//!
//! A single `mongodb::Client` is built at startup and cloned into every
//! request; the driver's connection pool (bounded by `max_pool_size`) is the
//! only shared resource.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use super::{NewProject, Project, ProjectPatch, ProjectStore, PROJECTS_COLLECTION};
use crate::error::StoreError;

/// Stored form of a project.
///
/// Updates have historically been written without validation, so reads accept
/// whatever shape a field ended up with: text fields take any scalar, and
/// `createdAt` may be a date, an RFC 3339 string or epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,

    // Older records may have been written without a name
    #[serde(default, deserialize_with = "lenient_text")]
    name: Option<String>,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<bson::DateTime>,

    owner_email: String,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    description: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    result_url: Option<String>,

    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
}

/// Read a text field from any scalar. Arrays, documents and nulls read as absent.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Bson>::deserialize(deserializer)? {
        Some(Bson::String(s)) => Some(s),
        Some(Bson::Int32(n)) => Some(n.to_string()),
        Some(Bson::Int64(n)) => Some(n.to_string()),
        Some(Bson::Double(n)) => Some(n.to_string()),
        Some(Bson::Boolean(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Read a timestamp stored as a BSON date, an RFC 3339 string or epoch millis.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<bson::DateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Bson>::deserialize(deserializer)? {
        Some(Bson::DateTime(dt)) => Some(dt),
        Some(Bson::String(s)) => DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| bson::DateTime::from_millis(dt.timestamp_millis())),
        Some(Bson::Int64(millis)) => Some(bson::DateTime::from_millis(millis)),
        _ => None,
    })
}

/// Decode one stored record.
fn decode_project(stored: Document) -> Result<Project, StoreError> {
    bson::from_document::<ProjectDocument>(stored)
        .map_err(|e| StoreError::Decode(e.to_string()))?
        .into_project()
}

impl ProjectDocument {
    fn from_new(project: NewProject) -> Self {
        Self {
            id: None,
            name: Some(project.name),
            created_at: Some(bson::DateTime::from_millis(project.created_at.timestamp_millis())),
            owner_email: project.owner_email,
            description: None,
            image_url: None,
            result_url: None,
            prompt: None,
        }
    }

    fn into_project(self) -> Result<Project, StoreError> {
        let id = self
            .id
            .ok_or_else(|| StoreError::Decode("project document has no _id".to_string()))?;

        // Unreadable creation times fall back to the id's embedded timestamp
        let stored_at = self.created_at.unwrap_or_else(|| id.timestamp());
        let created_at = DateTime::<Utc>::from_timestamp_millis(stored_at.timestamp_millis())
            .ok_or_else(|| {
                StoreError::Decode(format!("project {} has an out-of-range createdAt", id))
            })?;

        Ok(Project {
            id: id.to_hex(),
            name: self.name.unwrap_or_default(),
            created_at,
            owner_email: self.owner_email,
            description: self.description,
            image_url: self.image_url,
            result_url: self.result_url,
            prompt: self.prompt,
        })
    }
}

/// Project store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoProjectStore {
    client: Client,
    database: String,
    projects: Collection<ProjectDocument>,
}

impl MongoProjectStore {
    /// Build a pooled client for `uri` and bind it to `database`.
    ///
    /// The driver connects lazily; use [`ping`](Self::ping) to verify
    /// connectivity.
    pub async fn connect(uri: &str, database: &str, max_pool_size: u32) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        options.max_pool_size = Some(max_pool_size);
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());

        let client =
            Client::with_options(options).map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self::from_client(client, database))
    }

    /// Bind an existing client to `database`.
    pub fn from_client(client: Client, database: &str) -> Self {
        let projects = client
            .database(database)
            .collection::<ProjectDocument>(PROJECTS_COLLECTION);

        Self {
            client,
            database: database.to_string(),
            projects,
        }
    }

    /// Get the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Round-trip a `ping` command to the server.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    /// Estimated number of projects across all owners.
    pub async fn count(&self) -> Result<u64, StoreError> {
        self.projects
            .estimated_document_count()
            .await
            .map_err(store_error)
    }
}

#[async_trait]
impl ProjectStore for MongoProjectStore {
    async fn list(&self, owner_email: &str) -> Result<Vec<Project>, StoreError> {
        let mut cursor = self
            .projects
            .clone_with_type::<Document>()
            .find(doc! { "ownerEmail": owner_email })
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(store_error)?;

        // One unreadable record must not hide the owner's other projects
        let mut projects = Vec::new();
        while let Some(stored) = cursor.try_next().await.map_err(store_error)? {
            let stored_id = stored.get("_id").map(ToString::to_string);
            match decode_project(stored) {
                Ok(project) => projects.push(project),
                Err(e) => warn!(
                    owner_email = owner_email,
                    project_id = ?stored_id,
                    error = %e,
                    "Skipping unreadable project record"
                ),
            }
        }

        Ok(projects)
    }

    async fn get_by_id(&self, id: &str, owner_email: &str) -> Result<Option<Project>, StoreError> {
        let filter = owned_filter(id, owner_email)?;

        self.projects
            .clone_with_type::<Document>()
            .find_one(filter)
            .await
            .map_err(store_error)?
            .map(decode_project)
            .transpose()
    }

    async fn insert(&self, project: NewProject) -> Result<String, StoreError> {
        let document = ProjectDocument::from_new(project);

        let result = self
            .projects
            .insert_one(&document)
            .await
            .map_err(store_error)?;

        result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .ok_or_else(|| StoreError::Decode("inserted id is not an ObjectId".to_string()))
    }

    async fn update_by_id(
        &self,
        id: &str,
        owner_email: &str,
        patch: &ProjectPatch,
    ) -> Result<bool, StoreError> {
        let filter = owned_filter(id, owner_email)?;
        let fields = bson::to_document(patch).map_err(|e| StoreError::Decode(e.to_string()))?;

        let result = self
            .projects
            .update_one(filter, doc! { "$set": fields })
            .await
            .map_err(store_error)?;

        debug!(
            project_id = id,
            matched = result.matched_count,
            modified = result.modified_count,
            "Project update applied"
        );

        Ok(result.matched_count > 0)
    }

    async fn delete_by_id(&self, id: &str, owner_email: &str) -> Result<bool, StoreError> {
        let filter = owned_filter(id, owner_email)?;

        let result = self
            .projects
            .delete_one(filter)
            .await
            .map_err(store_error)?;

        Ok(result.deleted_count > 0)
    }
}

/// Parse a hex ObjectId.
fn parse_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

/// Filter matching one project owned by `owner_email`.
fn owned_filter(id: &str, owner_email: &str) -> Result<Document, StoreError> {
    Ok(doc! { "_id": parse_id(id)?, "ownerEmail": owner_email })
}

/// Map a driver error, separating connectivity from query failures.
fn store_error(err: mongodb::error::Error) -> StoreError {
    match err.kind.as_ref() {
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) | ErrorKind::DnsResolve { .. } => {
            StoreError::Connection(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}
