//! Domain error types for the resource engine.

use jsonapi_errors::{ErrorCollector, ErrorDocument, ErrorEntry, catalog};
use jsonapi_query::{Error as QueryError, ResourceId};
use thiserror::Error;

use super::model::FieldViolation;
use super::repo::RepositoryError;

const COUNT_MISMATCH_DETAIL: &str = "The resource collection does not contain the same number \
                                     of objects as the number of keys.";

/// Domain-level errors of the operation processors.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Parameter or payload problems, all reported together.
    #[error("request rejected with {} error(s)", .0.len())]
    Query(Vec<QueryError>),

    /// Explicitly addressed records that do not exist.
    #[error("{} record(s) not found", .0.len())]
    NotFound(Vec<ResourceId>),

    #[error("Count to key mismatch")]
    CountMismatch,

    #[error("The URL does not support the key {0}")]
    KeyNotIncludedInUrl(String),

    #[error("A key is required")]
    KeyRequired,

    #[error("The relation to {0} already exists.")]
    RelationExists(ResourceId),

    #[error("The relation already exists.")]
    ToOneRelationExists,

    /// Persistence rules violated, in record order.
    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<FieldViolation>),

    #[error("{0}")]
    Locked(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl DomainError {
    #[must_use]
    pub fn query(error: QueryError) -> Self {
        Self::Query(vec![error])
    }

    #[must_use]
    pub fn not_found(id: ResourceId) -> Self {
        Self::NotFound(vec![id])
    }

    /// Error entries in discovery order.
    #[must_use]
    pub fn into_entries(self) -> Vec<ErrorEntry> {
        match self {
            DomainError::Query(errors) => errors.into_iter().map(ErrorEntry::from).collect(),
            DomainError::NotFound(ids) => ids
                .iter()
                .map(|id| {
                    catalog::RECORD_NOT_FOUND
                        .as_entry(format!("The record identified by {id} could not be found."))
                })
                .collect(),
            DomainError::CountMismatch => {
                vec![catalog::COUNT_MISMATCH.as_entry(COUNT_MISMATCH_DETAIL)]
            }
            DomainError::KeyNotIncludedInUrl(key) => vec![
                catalog::KEY_NOT_INCLUDED_IN_URL
                    .as_entry(format!("The URL does not support the key {key}")),
            ],
            DomainError::KeyRequired => vec![
                catalog::KEY_REQUIRED.as_entry("The resource object does not contain a key."),
            ],
            DomainError::RelationExists(id) => vec![
                catalog::RELATION_EXISTS.as_entry(format!("The relation to {id} already exists.")),
            ],
            DomainError::ToOneRelationExists => {
                vec![catalog::RELATION_EXISTS.as_entry("The relation already exists.")]
            }
            DomainError::Validation(violations) => violations
                .into_iter()
                .map(|v| {
                    let text = format!("{} - {}", v.field, v.message);
                    catalog::VALIDATION_ERROR
                        .as_entry(text.clone())
                        .with_title(text)
                        .with_path(format!("/{}", v.field))
                })
                .collect(),
            DomainError::Locked(message) => vec![catalog::LOCKED.as_entry(message)],
            DomainError::Internal(e) => {
                tracing::warn!(error = %e, "internal error while processing request");
                vec![catalog::INTERNAL.as_entry("Internal Server Error")]
            }
        }
    }

    /// Aggregate error document. Never empty.
    pub fn into_document(self) -> ErrorDocument {
        let mut collector = ErrorCollector::new();
        collector.extend(self.into_entries());
        match collector.finish() {
            Err(doc) => doc,
            Ok(()) => catalog::INTERNAL.as_entry("Internal Server Error").into(),
        }
    }
}

impl From<Vec<QueryError>> for DomainError {
    fn from(errors: Vec<QueryError>) -> Self {
        Self::Query(errors)
    }
}

impl From<QueryError> for DomainError {
    fn from(error: QueryError) -> Self {
        Self::query(error)
    }
}

impl From<RepositoryError> for DomainError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { id, .. } => Self::not_found(id),
            RepositoryError::Validation(violations) => Self::Validation(violations),
            RepositoryError::Locked(message) => Self::Locked(message),
            RepositoryError::Backend(e) => Self::Internal(e),
        }
    }
}
