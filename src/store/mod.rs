//! Document store access for projects.
//!
//! Handlers talk to the store only through the [`ProjectStore`] trait, so the
//! router can be driven by MongoDB in production and by in-memory doubles in
//! tests.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               HTTP Router               │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           ProjectStore Trait            │
//! │  list / get / insert / update / delete  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           MongoProjectStore             │
//! │   (pooled client, "Projects" coll.)     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every operation that addresses a single project is scoped to the owner's
//! email, so one principal can never read or change another's records.

mod model;
mod mongo;

pub use model::{NewProject, Project, ProjectPatch, PROTECTED_FIELDS, UPDATABLE_FIELDS};
pub use mongo::MongoProjectStore;

use async_trait::async_trait;

use crate::error::StoreError;

/// Default database name.
pub const DEFAULT_DATABASE: &str = "NotesAI";

/// Collection holding project records.
pub const PROJECTS_COLLECTION: &str = "Projects";

/// Default upper bound on pooled store connections.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 5;

/// Collection-scoped project operations.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Projects owned by `owner_email`, newest first.
    async fn list(&self, owner_email: &str) -> Result<Vec<Project>, StoreError>;

    /// A single project, or `None` if it does not exist for this owner.
    async fn get_by_id(&self, id: &str, owner_email: &str) -> Result<Option<Project>, StoreError>;

    /// Insert a project and return its generated id.
    async fn insert(&self, project: NewProject) -> Result<String, StoreError>;

    /// Overwrite the patched fields. Returns whether a record matched.
    async fn update_by_id(
        &self,
        id: &str,
        owner_email: &str,
        patch: &ProjectPatch,
    ) -> Result<bool, StoreError>;

    /// Delete a project. Returns whether a record was removed.
    async fn delete_by_id(&self, id: &str, owner_email: &str) -> Result<bool, StoreError>;
}
