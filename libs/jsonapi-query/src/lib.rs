//! Resource schemas and request parameter validation for the JSON:API engine
//!
//! Everything here is synchronous and free of I/O:
//! - Wire key casing (`KeyFormatter`)
//! - Attribute value kinds and record ids (`ValueKind`, `ResourceId`)
//! - Per-type metadata and the registry (`ResourceSchema`, `SchemaRegistry`)
//! - Validation of raw parameters into an `OperationContext`
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod context;
pub mod error;
pub mod key_format;
pub mod limits;
pub mod params;
pub mod schema;
pub mod value;

pub use context::{OperationContext, SortDir, SortKey};
pub use error::Error;
pub use key_format::{KeyConvention, KeyFormat, KeyFormatter};
pub use limits::RequestLimits;
pub use params::{Operation, ParameterValidator, RawParams};
pub use schema::{
    AttributeDescriptor, Cardinality, FilterDescriptor, ID_FIELD, RelationshipDescriptor,
    ResourceSchema, SchemaRegistry,
};
pub use value::{IdKind, ResourceId, ValueFormatter, ValueKind};
