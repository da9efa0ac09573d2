//! Projection of result sets into wire documents.
//!
//! Layout: `{ "<type>": <object|array>, "linked"?: { "<type>": [..] } }`. Every
//! emitted key goes through the configured key formatter and every id is a
//! string.

use std::sync::Arc;

use jsonapi_query::{
    ID_FIELD, KeyFormatter, OperationContext, RelationshipDescriptor, ResourceSchema,
    SchemaRegistry,
};
use serde_json::{Map, Value, json};

use crate::domain::error::DomainError;
use crate::domain::model::{Linkage, Record, RecordRef};
use crate::domain::payload::LINKS_KEY;
use crate::domain::service::{PrimaryData, RelationshipData, ResultSet};

/// Top-level key of the included section.
pub const LINKED_KEY: &str = "linked";

pub struct DocumentSerializer<'a> {
    registry: &'a SchemaRegistry,
    keys: &'a KeyFormatter,
}

impl<'a> DocumentSerializer<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, keys: &'a KeyFormatter) -> Self {
        Self { registry, keys }
    }

    /// Render primary data and, when includes were requested, the linked section.
    ///
    /// # Errors
    /// `Internal` when a record carries a type without a registered schema.
    pub fn serialize(&self, result: &ResultSet) -> Result<Value, DomainError> {
        let ctx = &result.context;
        let primary = match &result.primary {
            PrimaryData::Single(record) => self.record(record, ctx)?,
            PrimaryData::Collection(records) => Value::Array(
                records
                    .iter()
                    .map(|r| self.record(r, ctx))
                    .collect::<Result<_, _>>()?,
            ),
        };

        let mut doc = Map::new();
        doc.insert(self.keys.format(ctx.resource_type()), primary);

        if ctx.has_include() {
            let mut linked = Map::new();
            for (resource_type, records) in result.included.by_type() {
                let rendered = records
                    .into_iter()
                    .map(|r| self.record(r, ctx))
                    .collect::<Result<_, _>>()?;
                linked.insert(self.keys.format(resource_type), Value::Array(rendered));
            }
            doc.insert(LINKED_KEY.to_owned(), Value::Object(linked));
        }
        Ok(Value::Object(doc))
    }

    /// Render `{ "<relationship>": linkage }`.
    #[must_use]
    pub fn serialize_relationship(&self, data: &RelationshipData) -> Value {
        let mut doc = Map::new();
        doc.insert(
            self.keys.format(&data.relationship.name),
            self.linkage(&data.relationship, &data.linkage),
        );
        Value::Object(doc)
    }

    fn record(&self, record: &Record, ctx: &OperationContext) -> Result<Value, DomainError> {
        let schema = self.schema(&record.resource_type)?;
        let fields = ctx
            .fields_for(schema.type_name())
            .unwrap_or_else(|| schema.fetchable_fields());
        let wanted = |name: &str| fields.iter().any(|f| f == name);

        let mut object = Map::new();
        if wanted(ID_FIELD) {
            object.insert(ID_FIELD.to_owned(), Value::String(record.id.to_string()));
        }
        for attribute in schema.attributes() {
            if !wanted(&attribute.name) {
                continue;
            }
            let value = record
                .attribute(&attribute.name)
                .map_or(Value::Null, |v| attribute.format_value(v));
            object.insert(self.keys.format(&attribute.name), value);
        }

        let mut links = Map::new();
        for relationship in schema.relationships() {
            if !wanted(&relationship.name) {
                continue;
            }
            let value = match record.linkage(&relationship.name) {
                Some(linkage) => self.linkage(relationship, linkage),
                None if relationship.is_to_many() => Value::Array(Vec::new()),
                None => Value::Null,
            };
            links.insert(self.keys.format(&relationship.name), value);
        }
        if !links.is_empty() {
            object.insert(LINKS_KEY.to_owned(), Value::Object(links));
        }

        Ok(Value::Object(object))
    }

    fn linkage(&self, relationship: &RelationshipDescriptor, linkage: &Linkage) -> Value {
        let target = |r: &RecordRef| {
            if relationship.polymorphic {
                json!({ "type": self.keys.format(&r.resource_type), "id": r.id.to_string() })
            } else {
                Value::String(r.id.to_string())
            }
        };
        match linkage {
            Linkage::ToOne(r) => r.as_ref().map_or(Value::Null, target),
            Linkage::ToMany(rs) => Value::Array(rs.iter().map(target).collect()),
        }
    }

    fn schema(&self, resource_type: &str) -> Result<&ResourceSchema, DomainError> {
        self.registry
            .get(resource_type)
            .map(Arc::as_ref)
            .ok_or_else(|| {
                DomainError::Internal(anyhow::anyhow!(
                    "no schema registered for `{resource_type}`"
                ))
            })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::include::IncludedSet;
    use jsonapi_query::{KeyFormat, ValueKind};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            ResourceSchema::builder("posts")
                .attribute("title", ValueKind::String)
                .attribute("body", ValueKind::String)
                .to_one("author", "people")
                .to_many("tags", "tags")
                .build(),
            ResourceSchema::builder("people")
                .attribute("name", ValueKind::String)
                .attribute("date_joined", ValueKind::DateTime)
                .build(),
            ResourceSchema::builder("tags").build(),
        ])
        .unwrap()
    }

    fn post() -> Record {
        Record::new("posts", 1)
            .with_attribute("title", "New post")
            .with_attribute("body", "A body!!!")
            .with_to_one("author", Some(RecordRef::new("people", 1)))
            .with_to_many("tags", vec![RecordRef::new("tags", 1), RecordRef::new("tags", 2)])
    }

    #[test]
    fn single_record_renders_as_object_with_string_ids() {
        let registry = registry();
        let keys = KeyFormatter::new(KeyFormat::Camelized);
        let result = ResultSet {
            primary: PrimaryData::Single(post()),
            included: IncludedSet::default(),
            context: OperationContext::new("posts"),
        };

        let doc = DocumentSerializer::new(&registry, &keys)
            .serialize(&result)
            .unwrap();
        assert_eq!(
            doc,
            json!({
                "posts": {
                    "id": "1",
                    "title": "New post",
                    "body": "A body!!!",
                    "links": {"author": "1", "tags": ["1", "2"]}
                }
            })
        );
    }

    #[test]
    fn sparse_fields_count_links_as_one_key() {
        let registry = registry();
        let keys = KeyFormatter::new(KeyFormat::Camelized);
        let result = ResultSet {
            primary: PrimaryData::Collection(vec![post()]),
            included: IncludedSet::default(),
            context: OperationContext::new("posts").with_fields(
                "posts",
                vec!["id".to_owned(), "title".to_owned(), "author".to_owned()],
            ),
        };

        let doc = DocumentSerializer::new(&registry, &keys)
            .serialize(&result)
            .unwrap();
        let object = doc["posts"][0].as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(doc["posts"][0]["links"], json!({"author": "1"}));
    }

    #[test]
    fn relationship_document_uses_formatted_name() {
        let registry = registry();
        let keys = KeyFormatter::new(KeyFormat::Camelized);
        let data = RelationshipData {
            relationship: RelationshipDescriptor::to_one("author", "people"),
            linkage: Linkage::ToOne(None),
        };
        let doc = DocumentSerializer::new(&registry, &keys).serialize_relationship(&data);
        assert_eq!(doc, json!({"author": null}));
    }
}
