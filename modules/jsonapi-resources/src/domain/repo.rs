use async_trait::async_trait;
use jsonapi_query::{ResourceId, ResourceSchema};

use super::model::{Changeset, FieldViolation, FindQuery, Record};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{resource_type} {id} not found")]
    NotFound {
        resource_type: String,
        id: ResourceId,
    },

    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("{0}")]
    Locked(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Storage collaborator. Every call is scoped to one resource type by its schema.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Records matching `query`, ordered by its sort keys.
    ///
    /// Ids that do not exist are simply absent from the result. For singleton
    /// types an empty query returns the single record.
    async fn find(
        &self,
        schema: &ResourceSchema,
        query: &FindQuery,
    ) -> Result<Vec<Record>, RepositoryError>;

    /// Batched lookup used while resolving includes.
    async fn fetch_related(
        &self,
        schema: &ResourceSchema,
        ids: &[ResourceId],
    ) -> Result<Vec<Record>, RepositoryError> {
        self.find(schema, &FindQuery::by_ids(ids.to_vec())).await
    }

    /// Persistence rules for a prospective write. `existing` is `None` on create.
    async fn validate(
        &self,
        _schema: &ResourceSchema,
        _changes: &Changeset,
        _existing: Option<&Record>,
    ) -> Result<Vec<FieldViolation>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn create(
        &self,
        schema: &ResourceSchema,
        changes: &Changeset,
    ) -> Result<Record, RepositoryError>;

    async fn update(
        &self,
        schema: &ResourceSchema,
        id: &ResourceId,
        changes: &Changeset,
    ) -> Result<Record, RepositoryError>;

    /// Domain delete policy. `Err(Locked)` forbids deleting `record`.
    async fn check_delete(
        &self,
        _schema: &ResourceSchema,
        _record: &Record,
    ) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn delete(&self, schema: &ResourceSchema, id: &ResourceId)
    -> Result<(), RepositoryError>;

    /// Put `record` back exactly as given. Used to undo a partially applied batch.
    async fn restore(&self, schema: &ResourceSchema, record: Record)
    -> Result<(), RepositoryError>;
}
