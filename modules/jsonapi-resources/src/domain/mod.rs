//! Domain layer of the resource engine.
//!
//! Contains the repository port, records, include resolution and the
//! operation processors.

pub mod error;
pub mod include;
pub mod model;
pub mod payload;
pub mod repo;
pub mod service;

pub use error::DomainError;
pub use repo::{Repository, RepositoryError};
pub use service::ResourceService;
