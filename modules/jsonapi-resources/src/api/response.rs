//! Transport-neutral responses.

use http::StatusCode;
use jsonapi_errors::{APPLICATION_JSON_API, ErrorDocument};
use serde_json::Value;
use tracing::error;

use crate::domain::error::DomainError;

/// Status plus optional JSON:API document; the caller owns the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub document: Option<Value>,
}

impl Response {
    #[must_use]
    pub fn ok(document: Value) -> Self {
        Self {
            status: StatusCode::OK,
            document: Some(document),
        }
    }

    #[must_use]
    pub fn created(document: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            document: Some(document),
        }
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            document: None,
        }
    }

    /// Error response carrying an `errors` array; status of its first entry.
    #[must_use]
    pub fn from_error(err: DomainError) -> Self {
        Self::from_document(&err.into_document())
    }

    #[must_use]
    pub fn from_document(doc: &ErrorDocument) -> Self {
        let status = doc.status();
        match serde_json::to_value(doc) {
            Ok(document) => Self {
                status,
                document: Some(document),
            },
            Err(e) => {
                error!(error = %e, "failed to render error document");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    document: None,
                }
            }
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Media type of the body, if there is one.
    #[must_use]
    pub fn content_type(&self) -> Option<&'static str> {
        self.document.as_ref().map(|_| APPLICATION_JSON_API)
    }

    /// The `errors` array of a failed response, empty otherwise.
    #[must_use]
    pub fn errors(&self) -> &[Value] {
        self.document
            .as_ref()
            .and_then(|d| d.get("errors"))
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }
}

impl From<DomainError> for Response {
    fn from(err: DomainError) -> Self {
        Self::from_error(err)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use jsonapi_query::ResourceId;

    #[test]
    fn error_response_carries_errors_array() {
        let resp = Response::from(DomainError::not_found(ResourceId::Int(999)));
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        assert_eq!(resp.errors().len(), 1);
        assert_eq!(resp.errors()[0]["status"], 404);
        assert_eq!(resp.content_type(), Some(APPLICATION_JSON_API));
    }

    #[test]
    fn no_content_has_no_document() {
        let resp = Response::no_content();
        assert!(resp.is_success());
        assert!(resp.document.is_none());
        assert!(resp.errors().is_empty());
    }
}
