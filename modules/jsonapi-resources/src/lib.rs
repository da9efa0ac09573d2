//! JSON:API Resource Engine
//!
//! Validates request parameters against declared resource schemas, executes
//! CRUD and relationship operations against a repository, resolves include
//! paths breadth-first and renders JSON:API documents.
//!
//! ## Architecture
//!
//! - **Schemas and validation** live in `jsonapi-query`
//! - **Error entries and the catalog** live in `jsonapi-errors`
//! - **Repository port**: storage is a collaborator behind [`Repository`];
//!   [`InMemoryRepository`] ships for tests and embedding

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

// === PUBLIC API ===
pub use api::{DocumentSerializer, Engine, Response};
pub use config::EngineConfig;
pub use domain::model::{Changeset, FieldViolation, FindQuery, Linkage, Record, RecordRef};
pub use domain::service::{PrimaryData, RelationshipData, ResultSet};
pub use domain::{DomainError, Repository, RepositoryError, ResourceService};
pub use infra::{InMemoryRepository, Rule};

// === CONFIGURATION ===
pub mod config;

// === LAYERS ===
pub mod api;
pub mod domain;
pub mod infra;
