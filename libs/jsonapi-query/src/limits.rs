//! Request size caps
//!
//! Bounds enforced while validating parameters:
//! - Maximum number of ids addressed by one request
//! - Maximum number of sort fields
//! - Maximum include path depth and number of include paths

use serde::Deserialize;

use crate::Error;

/// Default configuration for request limits
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestLimits {
    /// Maximum number of ids in one request (default: 1000)
    pub max_ids: usize,
    /// Maximum number of fields in `sort` (default: 5)
    pub max_sort_fields: usize,
    /// Maximum number of relationship segments in one include path (default: 5)
    pub max_include_depth: usize,
    /// Maximum number of include paths (default: 20)
    pub max_include_paths: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_ids: 1000,
            max_sort_fields: 5,
            max_include_depth: 5,
            max_include_paths: 20,
        }
    }
}

impl RequestLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_ids(mut self, max: usize) -> Self {
        self.max_ids = max;
        self
    }

    #[must_use]
    pub fn with_max_sort_fields(mut self, max: usize) -> Self {
        self.max_sort_fields = max;
        self
    }

    #[must_use]
    pub fn with_max_include_depth(mut self, max: usize) -> Self {
        self.max_include_depth = max;
        self
    }

    #[must_use]
    pub fn with_max_include_paths(mut self, max: usize) -> Self {
        self.max_include_paths = max;
        self
    }

    /// # Errors
    /// Returns `Error::LimitExceeded` when more than `max_ids` ids are addressed.
    pub fn validate_ids(&self, count: usize) -> Result<(), Error> {
        check("ids", count, self.max_ids)
    }

    /// # Errors
    /// Returns `Error::LimitExceeded` when more than `max_sort_fields` are requested.
    pub fn validate_sort(&self, count: usize) -> Result<(), Error> {
        check("sort fields", count, self.max_sort_fields)
    }

    /// # Errors
    /// Returns `Error::LimitExceeded` on too many paths or a path that is too deep.
    pub fn validate_include<'a, I>(&self, paths: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut count = 0;
        for path in paths {
            count += 1;
            check("include depth", path.split('.').count(), self.max_include_depth)?;
        }
        check("include paths", count, self.max_include_paths)
    }
}

fn check(what: &'static str, count: usize, max: usize) -> Result<(), Error> {
    if count > max {
        return Err(Error::LimitExceeded { what, max });
    }
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = RequestLimits::default();
        assert_eq!(limits.max_ids, 1000);
        assert_eq!(limits.max_sort_fields, 5);
        assert_eq!(limits.max_include_depth, 5);
        assert_eq!(limits.max_include_paths, 20);
    }

    #[test]
    fn test_validate_ids() {
        let limits = RequestLimits::new().with_max_ids(2);
        assert!(limits.validate_ids(2).is_ok());
        assert_eq!(
            limits.validate_ids(3),
            Err(Error::LimitExceeded { what: "ids", max: 2 })
        );
    }

    #[test]
    fn test_validate_sort() {
        let limits = RequestLimits::default();
        assert!(limits.validate_sort(5).is_ok());
        assert!(limits.validate_sort(6).is_err());
    }

    #[test]
    fn test_validate_include_depth_and_count() {
        let limits = RequestLimits::new()
            .with_max_include_depth(2)
            .with_max_include_paths(2);
        assert!(limits.validate_include(["posts.tags", "author"]).is_ok());
        assert!(limits.validate_include(["posts.tags.posts"]).is_err());
        assert!(limits.validate_include(["a", "b", "c"]).is_err());
    }

    #[test]
    fn test_limits_deserialize_with_defaults() {
        let limits: RequestLimits = serde_json::from_str(r#"{"max_ids": 10}"#).unwrap();
        assert_eq!(limits.max_ids, 10);
        assert_eq!(limits.max_sort_fields, 5);
        assert!(serde_json::from_str::<RequestLimits>(r#"{"max_top": 1}"#).is_err());
    }
}
