//! Ordered accumulation of error entries and the aggregate error document.

use std::fmt;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::entry::ErrorEntry;

/// Accumulates entries in discovery order.
///
/// Independent checks push into the same collector so a request reports every
/// problem at once instead of the first one only.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct ErrorCollector {
    entries: Vec<ErrorEntry>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ErrorEntry) {
        self.entries.push(entry);
    }

    pub fn extend<I>(&mut self, entries: I)
    where
        I: IntoIterator,
        I::Item: Into<ErrorEntry>,
    {
        self.entries.extend(entries.into_iter().map(Into::into));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    /// `Ok(())` when nothing was collected, otherwise the aggregate document.
    ///
    /// # Errors
    /// Returns the collected entries as an [`ErrorDocument`] if any were pushed.
    pub fn finish(self) -> Result<(), ErrorDocument> {
        if self.entries.is_empty() {
            Ok(())
        } else {
            Err(ErrorDocument::new(self.entries))
        }
    }
}

/// Aggregate failure document: `{ "errors": [ ... ] }`.
///
/// Always carries at least one entry when produced by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[must_use]
pub struct ErrorDocument {
    pub errors: Vec<ErrorEntry>,
}

impl ErrorDocument {
    pub fn new(errors: Vec<ErrorEntry>) -> Self {
        Self { errors }
    }

    /// Status of the whole response: the status of the first entry.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.errors
            .first()
            .map_or(StatusCode::INTERNAL_SERVER_ERROR, |e| e.status)
    }

    #[must_use]
    pub fn entries(&self) -> &[ErrorEntry] {
        &self.errors
    }

    /// Details of every entry, in order. Mostly useful in assertions and logs.
    #[must_use]
    pub fn details(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.detail.as_str()).collect()
    }
}

impl From<ErrorEntry> for ErrorDocument {
    fn from(entry: ErrorEntry) -> Self {
        Self::new(vec![entry])
    }
}

impl From<Vec<ErrorEntry>> for ErrorDocument {
    fn from(entries: Vec<ErrorEntry>) -> Self {
        Self::new(entries)
    }
}

impl fmt::Display for ErrorDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s): {}", self.errors.len(), self.details().join("; "))
    }
}

impl std::error::Error for ErrorDocument {}
