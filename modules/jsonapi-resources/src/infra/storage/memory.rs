//! In-memory repository.
//!
//! Supports:
//! - Equality filters on attributes and the key, any-of filters on relationships
//! - Composite sorting; records without a sort key keep ascending key order
//! - Required and max-length persistence rules
//! - Per-type delete guards

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use jsonapi_query::{ID_FIELD, IdKind, ResourceId, ResourceSchema};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::domain::model::{Changeset, FieldViolation, FindQuery, Linkage, Record};
use crate::domain::repo::{Repository, RepositoryError};

/// Persistence rule checked before any record of a batch is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rule {
    /// Attribute must be non-null and non-empty; relationship must link an
    /// existing record.
    Required(String),
    /// String attribute may hold at most this many characters.
    MaxLength(String, usize),
}

/// Returns the reason a record may not be deleted, if any.
pub type DeleteGuard = fn(&Record) -> Option<String>;

type Table = BTreeMap<ResourceId, Record>;

/// Repository keeping every record in process memory.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<HashMap<String, Table>>,
    rules: HashMap<String, Vec<Rule>>,
    guards: HashMap<String, DeleteGuard>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_rule(mut self, resource_type: impl Into<String>, rule: Rule) -> Self {
        self.rules.entry(resource_type.into()).or_default().push(rule);
        self
    }

    #[must_use]
    pub fn with_delete_guard(
        mut self,
        resource_type: impl Into<String>,
        guard: DeleteGuard,
    ) -> Self {
        self.guards.insert(resource_type.into(), guard);
        self
    }

    /// Seed a record, replacing any record with the same key.
    pub fn insert(&self, record: Record) {
        self.tables
            .write()
            .entry(record.resource_type.clone())
            .or_default()
            .insert(record.id.clone(), record);
    }

    #[must_use]
    pub fn get(&self, resource_type: &str, id: impl Into<ResourceId>) -> Option<Record> {
        let id = id.into();
        self.tables
            .read()
            .get(resource_type)
            .and_then(|t| t.get(&id))
            .cloned()
    }

    #[must_use]
    pub fn count(&self, resource_type: &str) -> usize {
        self.tables.read().get(resource_type).map_or(0, Table::len)
    }

    fn not_found(schema: &ResourceSchema, id: &ResourceId) -> RepositoryError {
        RepositoryError::NotFound {
            resource_type: schema.type_name().to_owned(),
            id: id.clone(),
        }
    }

    fn exists(tables: &HashMap<String, Table>, linkage: &Linkage) -> bool {
        linkage.refs().into_iter().all(|r| {
            tables
                .get(&r.resource_type)
                .is_some_and(|t| t.contains_key(&r.id))
        })
    }
}

fn matches_filter(record: &Record, name: &str, values: &[String]) -> bool {
    if name == ID_FIELD {
        return values.contains(&record.id.to_string());
    }
    if let Some(linkage) = record.linkage(name) {
        return linkage
            .refs()
            .into_iter()
            .any(|r| values.contains(&r.id.to_string()));
    }
    let rendered = match record.attribute(name) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    values.contains(&rendered)
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(_) => 4,
    }
}

/// Null sorts first; values of different shapes order by shape.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn find(
        &self,
        schema: &ResourceSchema,
        query: &FindQuery,
    ) -> Result<Vec<Record>, RepositoryError> {
        let tables = self.tables.read();
        let Some(table) = tables.get(schema.type_name()) else {
            return Ok(Vec::new());
        };

        let mut records: Vec<Record> = table
            .values()
            .filter(|r| query.ids.as_ref().is_none_or(|ids| ids.contains(&r.id)))
            .filter(|r| {
                query
                    .filters
                    .iter()
                    .all(|(name, values)| matches_filter(r, name, values))
            })
            .cloned()
            .collect();

        if !query.sort.is_empty() {
            records.sort_by(|a, b| {
                query.sort.iter().fold(Ordering::Equal, |acc, key| {
                    acc.then_with(|| {
                        key.dir
                            .apply(compare_values(a.attribute(&key.field), b.attribute(&key.field)))
                    })
                })
            });
        }
        Ok(records)
    }

    async fn validate(
        &self,
        schema: &ResourceSchema,
        changes: &Changeset,
        existing: Option<&Record>,
    ) -> Result<Vec<FieldViolation>, RepositoryError> {
        let Some(rules) = self.rules.get(schema.type_name()) else {
            return Ok(Vec::new());
        };

        let mut prospective = existing
            .cloned()
            .unwrap_or_else(|| Record::new(schema.type_name(), ResourceId::Int(0)));
        prospective.apply(changes);

        let tables = self.tables.read();
        let mut violations = Vec::new();
        for rule in rules {
            match rule {
                Rule::Required(field) => {
                    let missing = match prospective.linkage(field) {
                        Some(linkage) => linkage.is_empty() || !Self::exists(&tables, linkage),
                        None if schema.relationship(field).is_some() => true,
                        None => blank(prospective.attribute(field)),
                    };
                    if missing {
                        violations.push(FieldViolation::new(field.as_str(), "can't be blank"));
                    }
                }
                Rule::MaxLength(field, max) => {
                    let too_long = prospective
                        .attribute(field)
                        .and_then(Value::as_str)
                        .is_some_and(|s| s.chars().count() > *max);
                    if too_long {
                        violations.push(FieldViolation::new(
                            field.as_str(),
                            format!("is too long (maximum is {max} characters)"),
                        ));
                    }
                }
            }
        }
        Ok(violations)
    }

    async fn create(
        &self,
        schema: &ResourceSchema,
        changes: &Changeset,
    ) -> Result<Record, RepositoryError> {
        let mut tables = self.tables.write();
        let table = tables.entry(schema.type_name().to_owned()).or_default();

        let id = match (&changes.id, schema.id_kind()) {
            (Some(id), _) => id.clone(),
            (None, IdKind::Integer) => {
                let max = table
                    .keys()
                    .filter_map(|k| match k {
                        ResourceId::Int(i) => Some(*i),
                        ResourceId::Str(_) => None,
                    })
                    .max()
                    .unwrap_or(0);
                ResourceId::Int(max + 1)
            }
            (None, IdKind::String) => {
                return Err(anyhow::anyhow!(
                    "`{}` records need a client supplied key",
                    schema.type_name()
                )
                .into());
            }
        };
        if table.contains_key(&id) {
            return Err(anyhow::anyhow!("duplicate key {id} for `{}`", schema.type_name()).into());
        }

        let mut record = Record::new(schema.type_name(), id.clone());
        for attribute in schema.attributes() {
            record.attributes.insert(attribute.name.clone(), Value::Null);
        }
        for relationship in schema.relationships() {
            let empty = if relationship.is_to_many() {
                Linkage::ToMany(Vec::new())
            } else {
                Linkage::ToOne(None)
            };
            record.relationships.insert(relationship.name.clone(), empty);
        }
        record.apply(changes);

        table.insert(id, record.clone());
        debug!(resource_type = schema.type_name(), id = %record.id, "record stored");
        Ok(record)
    }

    async fn update(
        &self,
        schema: &ResourceSchema,
        id: &ResourceId,
        changes: &Changeset,
    ) -> Result<Record, RepositoryError> {
        let mut tables = self.tables.write();
        let record = tables
            .get_mut(schema.type_name())
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| Self::not_found(schema, id))?;
        record.apply(changes);
        Ok(record.clone())
    }

    async fn check_delete(
        &self,
        schema: &ResourceSchema,
        record: &Record,
    ) -> Result<(), RepositoryError> {
        match self.guards.get(schema.type_name()).and_then(|g| g(record)) {
            Some(reason) => Err(RepositoryError::Locked(reason)),
            None => Ok(()),
        }
    }

    async fn delete(
        &self,
        schema: &ResourceSchema,
        id: &ResourceId,
    ) -> Result<(), RepositoryError> {
        self.tables
            .write()
            .get_mut(schema.type_name())
            .and_then(|t| t.remove(id))
            .map(|_| ())
            .ok_or_else(|| Self::not_found(schema, id))
    }

    async fn restore(
        &self,
        _schema: &ResourceSchema,
        record: Record,
    ) -> Result<(), RepositoryError> {
        self.insert(record);
        Ok(())
    }
}
