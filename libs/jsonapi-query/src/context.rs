//! Validated per-request state handed from the parameter validator to the
//! operation processors and the serializer.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::value::ResourceId;

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// Reverse the sort direction (Asc <-> Desc)
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }

    /// Apply this direction to an ascending comparison result.
    #[must_use]
    pub fn apply(self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub dir: SortDir,
}

impl SortKey {
    #[must_use]
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Asc,
        }
    }

    #[must_use]
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            dir: SortDir::Desc,
        }
    }
}

/// Result of successful parameter validation. All names are canonical.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct OperationContext {
    resource_type: String,
    ids: Vec<ResourceId>,
    filters: BTreeMap<String, Vec<String>>,
    sort: Vec<SortKey>,
    fields: HashMap<String, Vec<String>>,
    include: Vec<String>,
}

impl OperationContext {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Self::default()
        }
    }

    /// Requested ids in request order; duplicates are dropped.
    pub fn with_ids<I>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = ResourceId>,
    {
        for id in ids {
            if !self.ids.contains(&id) {
                self.ids.push(id);
            }
        }
        self
    }

    pub fn with_filter(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.filters.insert(name.into(), values);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortKey>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_fields(mut self, type_name: impl Into<String>, fields: Vec<String>) -> Self {
        self.fields.insert(type_name.into(), fields);
        self
    }

    /// Add an include path (`author.posts`); repeated paths are kept once.
    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        let path = path.into();
        if !self.include.contains(&path) {
            self.include.push(path);
        }
        self
    }

    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    #[must_use]
    pub fn ids(&self) -> &[ResourceId] {
        &self.ids
    }

    #[must_use]
    pub fn filters(&self) -> &BTreeMap<String, Vec<String>> {
        &self.filters
    }

    #[must_use]
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// Sparse fieldset for a type; `None` means the default projection.
    #[must_use]
    pub fn fields_for(&self, type_name: &str) -> Option<&[String]> {
        self.fields.get(type_name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn include(&self) -> &[String] {
        &self.include
    }

    #[must_use]
    pub fn has_include(&self) -> bool {
        !self.include.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn ids_and_includes_are_deduplicated_in_order() {
        let ctx = OperationContext::new("tags")
            .with_ids([ResourceId::Int(6), ResourceId::Int(7), ResourceId::Int(6)])
            .with_include("posts")
            .with_include("posts.tags")
            .with_include("posts");

        assert_eq!(ctx.ids(), [ResourceId::Int(6), ResourceId::Int(7)]);
        assert_eq!(ctx.include(), ["posts", "posts.tags"]);
        assert!(ctx.has_include());
    }

    #[test]
    fn absent_fieldset_means_default_projection() {
        let ctx = OperationContext::new("posts").with_fields("posts", vec!["title".to_owned()]);
        assert_eq!(ctx.fields_for("posts"), Some(&["title".to_owned()][..]));
        assert_eq!(ctx.fields_for("people"), None);
    }

    #[test]
    fn sort_dir_applies_and_reverses() {
        assert_eq!(SortDir::Desc.apply(Ordering::Less), Ordering::Greater);
        assert_eq!(SortDir::Asc.reverse(), SortDir::Desc);
        assert_eq!(SortKey::desc("title").dir, SortDir::Desc);
    }
}
