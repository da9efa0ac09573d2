//! Core error types for the JSON:API engine
//!
//! This crate provides pure data types for error reporting, with no dependencies
//! on HTTP frameworks. It includes:
//! - A single entry of an `errors` array (`ErrorEntry`)
//! - Error catalog support (`ErrDef`)
//! - Ordered accumulation of entries across a request (`ErrorCollector`)
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod collector;
pub mod entry;

// Re-export commonly used types
pub use catalog::ErrDef;
pub use collector::{ErrorCollector, ErrorDocument};
pub use entry::ErrorEntry;

/// Media type of every document the engine emits, error documents included.
pub const APPLICATION_JSON_API: &str = "application/vnd.api+json";
