//! Records as the engine sees them, independent of any storage backend.

use std::collections::BTreeMap;
use std::fmt;

use jsonapi_query::{ResourceId, SortKey};
use serde_json::{Map, Value};

/// `(type, id)` pair; the unit of deduplication in the include graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordRef {
    pub resource_type: String,
    pub id: ResourceId,
}

impl RecordRef {
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id: impl Into<ResourceId>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.id)
    }
}

/// Current value of one relationship on a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Linkage {
    ToOne(Option<RecordRef>),
    ToMany(Vec<RecordRef>),
}

impl Linkage {
    /// Linked refs in stored order.
    #[must_use]
    pub fn refs(&self) -> Vec<&RecordRef> {
        match self {
            Linkage::ToOne(r) => r.iter().collect(),
            Linkage::ToMany(rs) => rs.iter().collect(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Linkage::ToOne(r) => r.is_none(),
            Linkage::ToMany(rs) => rs.is_empty(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub resource_type: String,
    pub id: ResourceId,
    /// Stored (normalized) attribute values keyed by canonical name.
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Linkage>,
}

impl Record {
    #[must_use]
    pub fn new(resource_type: impl Into<String>, id: impl Into<ResourceId>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            attributes: Map::new(),
            relationships: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_to_one(mut self, name: impl Into<String>, target: Option<RecordRef>) -> Self {
        self.relationships
            .insert(name.into(), Linkage::ToOne(target));
        self
    }

    #[must_use]
    pub fn with_to_many(mut self, name: impl Into<String>, targets: Vec<RecordRef>) -> Self {
        self.relationships
            .insert(name.into(), Linkage::ToMany(targets));
        self
    }

    #[must_use]
    pub fn record_ref(&self) -> RecordRef {
        RecordRef::new(self.resource_type.clone(), self.id.clone())
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn linkage(&self, name: &str) -> Option<&Linkage> {
        self.relationships.get(name)
    }

    /// Apply a changeset on top of this record, leaving untouched keys as they are.
    pub fn apply(&mut self, changes: &Changeset) {
        for (name, value) in &changes.attributes {
            self.attributes.insert(name.clone(), value.clone());
        }
        for (name, linkage) in &changes.relationships {
            self.relationships.insert(name.clone(), linkage.clone());
        }
    }
}

/// Parsed write intent for one record. Only keys present in the payload appear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Changeset {
    /// Key carried by the payload, if any.
    pub id: Option<ResourceId>,
    pub attributes: Map<String, Value>,
    pub relationships: BTreeMap<String, Linkage>,
}

impl Changeset {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_relationship(mut self, name: impl Into<String>, linkage: Linkage) -> Self {
        self.relationships.insert(name.into(), linkage);
        self
    }
}

/// A persistence rule violated by a record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldViolation {
    /// Canonical attribute or relationship name.
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Repository query derived from a validated operation context.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FindQuery {
    /// `None` for a collection query.
    pub ids: Option<Vec<ResourceId>>,
    /// Canonical filter name to accepted values (any-of).
    pub filters: BTreeMap<String, Vec<String>>,
    pub sort: Vec<SortKey>,
}

impl FindQuery {
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by_ids(ids: Vec<ResourceId>) -> Self {
        Self {
            ids: Some(ids),
            ..Self::default()
        }
    }
}
