//! Query-level errors and their mapping onto error entries (pure data)
//!
//! Every variant corresponds to one catalog definition. Messages double as the
//! entry detail, so they are phrased for API consumers.

use jsonapi_errors::{ErrorEntry, catalog};

/// Errors found while validating request parameters or building schemas.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{param} is not allowed.")]
    ParamNotAllowed { param: String },

    #[error("{filter} is not allowed.")]
    FilterNotAllowed { filter: String },

    #[error("{value} is not a valid value for {field}.")]
    InvalidFilterValue { value: String, field: String },

    #[error("{value} is not a valid value for {field}.")]
    InvalidFieldValue { value: String, field: String },

    #[error("{param} is not a valid sort param for {resource}")]
    InvalidSortParam { param: String, resource: String },

    #[error("{resource} is not a valid resource.")]
    InvalidResource { resource: String },

    #[error("{field} is not a valid field for {resource}.")]
    InvalidField { field: String, resource: String },

    #[error("{relationship} is not a valid association of {resource}")]
    InvalidInclude {
        relationship: String,
        resource: String,
    },

    #[error("The required parameter, {param}, is missing.")]
    ParamMissing { param: String },

    #[error("Too many {what} (max: {max}).")]
    LimitExceeded { what: &'static str, max: usize },

    /// Inconsistent schema declarations. Never caused by a client.
    #[error("schema error: {0}")]
    Schema(String),
}

impl Error {
    #[must_use]
    pub fn param_not_allowed(param: impl Into<String>) -> Self {
        Error::ParamNotAllowed {
            param: param.into(),
        }
    }

    #[must_use]
    pub fn param_missing(param: impl Into<String>) -> Self {
        Error::ParamMissing {
            param: param.into(),
        }
    }

    #[must_use]
    pub fn invalid_field_value(value: impl Into<String>, field: impl Into<String>) -> Self {
        Error::InvalidFieldValue {
            value: value.into(),
            field: field.into(),
        }
    }
}

impl From<Error> for ErrorEntry {
    fn from(err: Error) -> Self {
        use Error::{
            FilterNotAllowed, InvalidField, InvalidFieldValue, InvalidFilterValue, InvalidInclude,
            InvalidResource, InvalidSortParam, LimitExceeded, ParamMissing, ParamNotAllowed,
            Schema,
        };

        let def = match &err {
            ParamNotAllowed { .. } => catalog::PARAM_NOT_ALLOWED,
            FilterNotAllowed { .. } => catalog::FILTER_NOT_ALLOWED,
            InvalidFilterValue { .. } => catalog::INVALID_FILTER_VALUE,
            InvalidFieldValue { .. } => catalog::INVALID_FIELD_VALUE,
            InvalidSortParam { .. } => catalog::INVALID_SORT_PARAM,
            InvalidResource { .. } => catalog::INVALID_RESOURCE,
            InvalidField { .. } => catalog::INVALID_FIELD,
            InvalidInclude { .. } => catalog::INVALID_INCLUDE,
            ParamMissing { .. } => catalog::PARAM_MISSING,
            LimitExceeded { .. } => catalog::LIMIT_EXCEEDED,
            Schema(msg) => {
                tracing::error!(error = %msg, "schema error surfaced to a request");
                return catalog::INTERNAL.as_entry("Internal Server Error");
            }
        };
        def.as_entry(err.to_string())
    }
}
