//! Storage implementations.

mod memory;

pub use memory::{DeleteGuard, InMemoryRepository, Rule};
