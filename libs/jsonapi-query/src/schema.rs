//! Declarative per-type resource metadata and the process-wide registry.
//!
//! A [`ResourceSchema`] is built once at startup through [`ResourceSchemaBuilder`]
//! and never changes afterwards. All schemas live in a [`SchemaRegistry`] that is
//! looked up by canonical type name (`posts`, `iso_currencies`).
//!
//! # Example
//!
//! ```rust
//! use jsonapi_query::{IdKind, ResourceSchema, SchemaRegistry, ValueKind};
//!
//! let posts = ResourceSchema::builder("posts")
//!     .attribute("title", ValueKind::String)
//!     .attribute("body", ValueKind::String)
//!     .to_one("author", "people")
//!     .filters(["title", "author"])
//!     .build();
//! let people = ResourceSchema::builder("people")
//!     .attribute("name", ValueKind::String)
//!     .to_many("posts", "posts")
//!     .build();
//!
//! let registry = SchemaRegistry::from_schemas([posts, people]).unwrap();
//! assert!(registry.get("posts").unwrap().relationship("author").is_some());
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::Error;
use crate::value::{IdKind, ValueFormatter, ValueKind};

/// Name every primary key carries on the wire and in field lists.
pub const ID_FIELD: &str = "id";

/// Verifies a single filter value. `false` rejects the value.
pub type FilterVerifier = fn(&str) -> bool;

#[derive(Clone, Debug)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: ValueKind,
    formatter: Option<Arc<dyn ValueFormatter>>,
}

impl AttributeDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            formatter: None,
        }
    }

    #[must_use]
    pub fn with_formatter(mut self, formatter: Arc<dyn ValueFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Stored value to wire value.
    #[must_use]
    pub fn format_value(&self, value: &Value) -> Value {
        match &self.formatter {
            Some(f) => f.format(value),
            None => self.kind.format(value),
        }
    }

    /// Wire value to stored value; `None` when the value is not acceptable.
    #[must_use]
    pub fn unformat_value(&self, value: &Value) -> Option<Value> {
        match &self.formatter {
            Some(f) => f.unformat(value),
            None => self.kind.normalize(value),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationshipDescriptor {
    pub name: String,
    pub cardinality: Cardinality,
    /// Nominal related type. For polymorphic relationships each linked record
    /// carries its own actual type.
    pub related_type: String,
    pub polymorphic: bool,
}

impl RelationshipDescriptor {
    #[must_use]
    pub fn to_one(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::One,
            related_type: related_type.into(),
            polymorphic: false,
        }
    }

    #[must_use]
    pub fn to_many(name: impl Into<String>, related_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cardinality: Cardinality::Many,
            related_type: related_type.into(),
            polymorphic: false,
        }
    }

    #[must_use]
    pub fn polymorphic(mut self) -> Self {
        self.polymorphic = true;
        self
    }

    #[must_use]
    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::Many
    }
}

#[derive(Clone, Debug)]
pub struct FilterDescriptor {
    pub name: String,
    verifier: Option<FilterVerifier>,
}

impl FilterDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            verifier: None,
        }
    }

    #[must_use]
    pub fn verified_by(mut self, verifier: FilterVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    #[must_use]
    pub fn accepts(&self, value: &str) -> bool {
        self.verifier.is_none_or(|verify| verify(value))
    }
}

/// Immutable metadata of one resource type.
#[derive(Clone, Debug)]
pub struct ResourceSchema {
    type_name: String,
    key_param: String,
    id_kind: IdKind,
    singleton: bool,
    attributes: Vec<AttributeDescriptor>,
    relationships: Vec<RelationshipDescriptor>,
    filters: Vec<FilterDescriptor>,
    sortable: HashSet<String>,
    fetchable: Vec<String>,
    creatable: Option<HashSet<String>>,
    updatable: Option<HashSet<String>>,
}

impl ResourceSchema {
    #[must_use]
    pub fn builder(type_name: impl Into<String>) -> ResourceSchemaBuilder {
        ResourceSchemaBuilder::new(type_name)
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Name the primary key is addressed by in id parameters (`id`, `code`).
    #[must_use]
    pub fn key_param(&self) -> &str {
        &self.key_param
    }

    #[must_use]
    pub fn id_kind(&self) -> IdKind {
        self.id_kind
    }

    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    #[must_use]
    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    #[must_use]
    pub fn relationships(&self) -> &[RelationshipDescriptor] {
        &self.relationships
    }

    #[must_use]
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescriptor> {
        self.relationships.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn filter(&self, name: &str) -> Option<&FilterDescriptor> {
        self.filters.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn is_sortable(&self, field: &str) -> bool {
        self.sortable.contains(field)
    }

    /// Default projection: the fields shown when no sparse fieldset applies.
    #[must_use]
    pub fn fetchable_fields(&self) -> &[String] {
        &self.fetchable
    }

    #[must_use]
    pub fn is_fetchable(&self, field: &str) -> bool {
        self.fetchable.iter().any(|f| f == field)
    }

    #[must_use]
    pub fn can_create(&self, field: &str) -> bool {
        self.creatable
            .as_ref()
            .map_or_else(|| self.is_writable(field), |set| set.contains(field))
    }

    #[must_use]
    pub fn can_update(&self, field: &str) -> bool {
        self.updatable
            .as_ref()
            .map_or_else(|| self.is_writable(field), |set| set.contains(field))
    }

    fn is_writable(&self, field: &str) -> bool {
        self.attribute(field).is_some() || self.relationship(field).is_some()
    }
}

/// Builder for [`ResourceSchema`].
#[must_use]
pub struct ResourceSchemaBuilder {
    schema: ResourceSchema,
    sortable: Option<HashSet<String>>,
    fetchable: Option<Vec<String>>,
}

impl ResourceSchemaBuilder {
    fn new(type_name: impl Into<String>) -> Self {
        Self {
            schema: ResourceSchema {
                type_name: type_name.into(),
                key_param: ID_FIELD.to_owned(),
                id_kind: IdKind::Integer,
                singleton: false,
                attributes: Vec::new(),
                relationships: Vec::new(),
                filters: Vec::new(),
                sortable: HashSet::new(),
                fetchable: Vec::new(),
                creatable: None,
                updatable: None,
            },
            sortable: None,
            fetchable: None,
        }
    }

    pub fn id_kind(mut self, kind: IdKind) -> Self {
        self.schema.id_kind = kind;
        self
    }

    /// Extra parameter name the primary key is addressed by, e.g. `code`.
    pub fn key_param(mut self, name: impl Into<String>) -> Self {
        self.schema.key_param = name.into();
        self
    }

    pub fn singleton(mut self) -> Self {
        self.schema.singleton = true;
        self
    }

    pub fn attribute(self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.attribute_with(AttributeDescriptor::new(name, kind))
    }

    pub fn attribute_with(mut self, attribute: AttributeDescriptor) -> Self {
        self.schema.attributes.push(attribute);
        self
    }

    pub fn to_one(self, name: impl Into<String>, related_type: impl Into<String>) -> Self {
        self.relationship(RelationshipDescriptor::to_one(name, related_type))
    }

    pub fn to_many(self, name: impl Into<String>, related_type: impl Into<String>) -> Self {
        self.relationship(RelationshipDescriptor::to_many(name, related_type))
    }

    pub fn relationship(mut self, relationship: RelationshipDescriptor) -> Self {
        self.schema.relationships.push(relationship);
        self
    }

    pub fn filter(mut self, filter: FilterDescriptor) -> Self {
        self.schema.filters.push(filter);
        self
    }

    pub fn filters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema
            .filters
            .extend(names.into_iter().map(FilterDescriptor::new));
        self
    }

    /// Restrict sortable fields. Defaults to every attribute.
    pub fn sortable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sortable = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict the default projection. Defaults to `id`, every attribute and
    /// every relationship, in declaration order.
    pub fn fetchable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fetchable = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn creatable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.creatable = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn updatable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.updatable = Some(names.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn build(self) -> ResourceSchema {
        let mut schema = self.schema;
        schema.sortable = self
            .sortable
            .unwrap_or_else(|| schema.attributes.iter().map(|a| a.name.clone()).collect());
        schema.fetchable = self.fetchable.unwrap_or_else(|| {
            std::iter::once(ID_FIELD.to_owned())
                .chain(schema.attributes.iter().map(|a| a.name.clone()))
                .chain(schema.relationships.iter().map(|r| r.name.clone()))
                .collect()
        });
        schema
    }
}

/// Process-wide, read-only set of schemas keyed by type name.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<ResourceSchema>>,
}

impl SchemaRegistry {
    /// Register a complete set of schemas.
    ///
    /// # Errors
    /// Returns `Error::Schema` on duplicate type names or when a non-polymorphic
    /// relationship points at an unregistered type.
    pub fn from_schemas<I>(schemas: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = ResourceSchema>,
    {
        let mut map = HashMap::new();
        for schema in schemas {
            let name = schema.type_name.clone();
            if map.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(Error::Schema(format!("duplicate resource type `{name}`")));
            }
        }
        for schema in map.values() {
            for rel in schema.relationships.iter().filter(|r| !r.polymorphic) {
                if !map.contains_key(&rel.related_type) {
                    return Err(Error::Schema(format!(
                        "relationship `{}.{}` points at unknown type `{}`",
                        schema.type_name, rel.name, rel.related_type
                    )));
                }
            }
        }
        Ok(Self { schemas: map })
    }

    #[must_use]
    pub fn get(&self, type_name: &str) -> Option<&Arc<ResourceSchema>> {
        self.schemas.get(type_name)
    }

    /// Like [`SchemaRegistry::get`], for types the engine itself produced.
    ///
    /// # Errors
    /// Returns `Error::Schema` when the type is not registered.
    pub fn require(&self, type_name: &str) -> Result<&Arc<ResourceSchema>, Error> {
        self.get(type_name)
            .ok_or_else(|| Error::Schema(format!("unknown resource type `{type_name}`")))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn posts() -> ResourceSchema {
        ResourceSchema::builder("posts")
            .attribute("title", ValueKind::String)
            .attribute("body", ValueKind::String)
            .to_one("author", "people")
            .to_many("tags", "tags")
            .updatable(["title", "body", "tags"])
            .build()
    }

    #[test]
    fn defaults_cover_every_declared_field() {
        let s = posts();
        assert_eq!(s.fetchable_fields(), ["id", "title", "body", "author", "tags"]);
        assert!(s.is_sortable("title"));
        assert!(!s.is_sortable("id"));
        assert!(s.can_create("author"));
        assert!(!s.can_create("id"));
        assert!(!s.can_update("author"));
        assert_eq!(s.key_param(), "id");
        assert_eq!(s.id_kind(), IdKind::Integer);
    }

    #[test]
    fn filter_verifier_rejects_values() {
        let f = FilterDescriptor::new("name").verified_by(|v| v.len() > 1);
        assert!(f.accepts("Joe"));
        assert!(!f.accepts("L"));
        assert!(FilterDescriptor::new("title").accepts("anything"));
    }

    #[test]
    fn registry_rejects_dangling_relationships() {
        let err = SchemaRegistry::from_schemas([posts()]).unwrap_err();
        assert!(matches!(err, Error::Schema(msg) if msg.contains("people")));
    }

    #[test]
    fn registry_rejects_duplicates() {
        let tags = || ResourceSchema::builder("tags").build();
        assert!(SchemaRegistry::from_schemas([tags(), tags()]).is_err());
    }

    #[test]
    fn polymorphic_targets_are_not_checked() {
        let pictures = ResourceSchema::builder("pictures")
            .relationship(RelationshipDescriptor::to_one("imageable", "imageables").polymorphic())
            .build();
        let registry = SchemaRegistry::from_schemas([pictures]).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.require("imageables").is_err());
    }
}
