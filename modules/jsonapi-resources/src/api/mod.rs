//! Outer surface of the engine: document serialization and responses.

pub mod document;
pub mod engine;
pub mod response;

pub use document::DocumentSerializer;
pub use engine::Engine;
pub use response::Response;
