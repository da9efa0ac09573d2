//! Infrastructure layer of the resource engine.
//!
//! Contains storage implementations of the repository port.

pub mod storage;

pub use storage::{InMemoryRepository, Rule};
