//! Parsing of resource objects from create/update bodies into changesets.

use jsonapi_query::{
    Error as QueryError, ID_FIELD, KeyFormatter, RelationshipDescriptor, ResourceSchema,
    SchemaRegistry,
};
use serde_json::{Map, Value};

use super::model::{Changeset, Linkage, RecordRef};

/// Key of the object holding relationship linkage inside a resource object.
pub const LINKS_KEY: &str = "links";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    Create,
    Update,
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct PayloadParser<'a> {
    registry: &'a SchemaRegistry,
    keys: &'a KeyFormatter,
}

impl<'a> PayloadParser<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, keys: &'a KeyFormatter) -> Self {
        Self { registry, keys }
    }

    /// Parse one resource object.
    ///
    /// Attribute problems are reported before relationship problems.
    ///
    /// # Errors
    /// Every unpermitted key and every value that cannot be normalized.
    pub fn parse(
        &self,
        schema: &ResourceSchema,
        mode: WriteMode,
        object: &Value,
    ) -> Result<Changeset, Vec<QueryError>> {
        let Value::Object(object) = object else {
            return Err(vec![QueryError::invalid_field_value(
                display(object),
                self.keys.format(schema.type_name()),
            )]);
        };

        let mut changes = Changeset::new();
        let mut errors = Vec::new();
        let mut link_errors = Vec::new();

        for (key, value) in object {
            if key == LINKS_KEY {
                match value {
                    Value::Object(links) => {
                        self.parse_links(schema, mode, links, &mut changes, &mut link_errors);
                    }
                    other => link_errors.push(QueryError::invalid_field_value(
                        display(other),
                        key.as_str(),
                    )),
                }
            } else if key == ID_FIELD {
                match schema.id_kind().from_json(value) {
                    Some(id) => changes.id = Some(id),
                    None => errors.push(QueryError::invalid_field_value(
                        display(value),
                        key.as_str(),
                    )),
                }
            } else {
                let attribute = self
                    .keys
                    .unformat(key)
                    .filter(|name| Self::permitted(schema, mode, name))
                    .and_then(|name| schema.attribute(&name));
                let Some(attribute) = attribute else {
                    errors.push(QueryError::param_not_allowed(key.as_str()));
                    continue;
                };
                match attribute.unformat_value(value) {
                    Some(stored) => {
                        changes.attributes.insert(attribute.name.clone(), stored);
                    }
                    None => errors.push(QueryError::invalid_field_value(
                        display(value),
                        key.as_str(),
                    )),
                }
            }
        }

        errors.extend(link_errors);
        if errors.is_empty() {
            Ok(changes)
        } else {
            Err(errors)
        }
    }

    fn permitted(schema: &ResourceSchema, mode: WriteMode, name: &str) -> bool {
        match mode {
            WriteMode::Create => schema.can_create(name),
            WriteMode::Update => schema.can_update(name),
        }
    }

    fn parse_links(
        &self,
        schema: &ResourceSchema,
        mode: WriteMode,
        links: &Map<String, Value>,
        changes: &mut Changeset,
        errors: &mut Vec<QueryError>,
    ) {
        for (key, value) in links {
            let relationship = self
                .keys
                .unformat(key)
                .filter(|name| Self::permitted(schema, mode, name))
                .and_then(|name| schema.relationship(&name));
            let Some(relationship) = relationship else {
                errors.push(QueryError::param_not_allowed(key.as_str()));
                continue;
            };
            match self.parse_linkage(relationship, key, value) {
                Ok(linkage) => {
                    changes
                        .relationships
                        .insert(relationship.name.clone(), linkage);
                }
                Err(e) => errors.push(e),
            }
        }
    }

    /// Parse linkage for `relationship` from `value`: `null`, an id, a list of
    /// ids, or `{type, id}` objects for polymorphic relationships.
    ///
    /// # Errors
    /// `InvalidFieldValue` naming `wire_key` when an element does not parse.
    pub fn parse_linkage(
        &self,
        relationship: &RelationshipDescriptor,
        wire_key: &str,
        value: &Value,
    ) -> Result<Linkage, QueryError> {
        let invalid = |v: &Value| QueryError::invalid_field_value(display(v), wire_key);

        if relationship.is_to_many() {
            let items: Vec<&Value> = match value {
                Value::Null => Vec::new(),
                Value::Array(items) => items.iter().collect(),
                other => vec![other],
            };
            let refs = items
                .into_iter()
                .map(|item| {
                    self.parse_ref(relationship, item)
                        .ok_or_else(|| invalid(item))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Linkage::ToMany(refs))
        } else if value.is_null() {
            Ok(Linkage::ToOne(None))
        } else {
            let target = self
                .parse_ref(relationship, value)
                .ok_or_else(|| invalid(value))?;
            Ok(Linkage::ToOne(Some(target)))
        }
    }

    fn parse_ref(
        &self,
        relationship: &RelationshipDescriptor,
        value: &Value,
    ) -> Option<RecordRef> {
        let (related_type, id) = if relationship.polymorphic {
            let object = value.as_object()?;
            let wire_type = object.get("type")?.as_str()?;
            (self.keys.unformat(wire_type)?, object.get(ID_FIELD)?)
        } else {
            (relationship.related_type.clone(), value)
        };
        let related = self.registry.get(&related_type)?;
        let id = related.id_kind().from_json(id)?;
        Some(RecordRef::new(related_type, id))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use jsonapi_query::{IdKind, KeyFormat, ValueKind};
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::from_schemas([
            ResourceSchema::builder("posts")
                .attribute("title", ValueKind::String)
                .attribute("body", ValueKind::String)
                .to_one("author", "people")
                .to_one("section", "sections")
                .to_many("tags", "tags")
                .updatable(["title", "body", "section", "tags"])
                .build(),
            ResourceSchema::builder("people")
                .attribute("name", ValueKind::String)
                .build(),
            ResourceSchema::builder("sections").build(),
            ResourceSchema::builder("tags").build(),
            ResourceSchema::builder("expense_entries")
                .attribute("transaction_date", ValueKind::Date)
                .attribute("cost", ValueKind::Float)
                .to_one("iso_currency", "iso_currencies")
                .build(),
            ResourceSchema::builder("iso_currencies")
                .id_kind(IdKind::String)
                .build(),
        ])
        .unwrap()
    }

    fn parse(ty: &str, mode: WriteMode, body: Value) -> Result<Changeset, Vec<String>> {
        let registry = registry();
        let keys = KeyFormatter::new(KeyFormat::Camelized);
        let schema = registry.get(ty).unwrap();
        PayloadParser::new(&registry, &keys)
            .parse(schema, mode, &body)
            .map_err(|errs| errs.iter().map(ToString::to_string).collect())
    }

    #[test]
    fn attributes_and_links_are_parsed() {
        let changes = parse(
            "posts",
            WriteMode::Create,
            json!({"title": "JR is Great", "links": {"author": 3, "tags": [3, 4]}}),
        )
        .unwrap();

        assert_eq!(changes.attributes["title"], json!("JR is Great"));
        assert_eq!(
            changes.relationships["author"],
            Linkage::ToOne(Some(RecordRef::new("people", 3)))
        );
        assert_eq!(
            changes.relationships["tags"],
            Linkage::ToMany(vec![RecordRef::new("tags", 3), RecordRef::new("tags", 4)])
        );
    }

    #[test]
    fn explicit_null_clears_and_empty_list_empties() {
        let changes = parse(
            "posts",
            WriteMode::Update,
            json!({"links": {"section": null, "tags": []}}),
        )
        .unwrap();
        assert_eq!(changes.relationships["section"], Linkage::ToOne(None));
        assert_eq!(changes.relationships["tags"], Linkage::ToMany(Vec::new()));
    }

    #[test]
    fn unpermitted_keys_are_reported_attributes_first() {
        let errs = parse(
            "posts",
            WriteMode::Update,
            json!({"links": {"author": 1, "tags": [3, 4]}, "subject": "A great new Post"}),
        )
        .unwrap_err();
        assert_eq!(errs, ["subject is not allowed.", "author is not allowed."]);
    }

    #[test]
    fn keys_in_the_wrong_case_are_rejected() {
        let errs = parse(
            "posts",
            WriteMode::Create,
            json!({"Title": "x", "BODY": "y"}),
        )
        .unwrap_err();
        assert_eq!(errs, ["Title is not allowed.", "BODY is not allowed."]);
    }

    #[test]
    fn values_are_normalized_per_kind() {
        let changes = parse(
            "expense_entries",
            WriteMode::Create,
            json!({
                "transactionDate": "2014/04/15",
                "cost": 50.58,
                "links": {"isoCurrency": "USD"}
            }),
        )
        .unwrap();
        assert_eq!(changes.attributes["transaction_date"], json!("2014-04-15"));
        assert_eq!(
            changes.relationships["iso_currency"],
            Linkage::ToOne(Some(RecordRef::new("iso_currencies", "USD")))
        );

        let errs = parse(
            "expense_entries",
            WriteMode::Create,
            json!({"cost": "cheap"}),
        )
        .unwrap_err();
        assert_eq!(errs, ["cheap is not a valid value for cost."]);
    }

    #[test]
    fn links_must_be_an_object() {
        let errs = parse("posts", WriteMode::Create, json!({"links": [1]})).unwrap_err();
        assert_eq!(errs.len(), 1);
        let errs = parse("posts", WriteMode::Update, json!({"linked_objects": {}})).unwrap_err();
        assert_eq!(errs, ["linked_objects is not allowed."]);
    }
}
