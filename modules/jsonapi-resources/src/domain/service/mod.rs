//! Operation processors.
//!
//! Each operation validates its parameters completely before the repository
//! is touched. Writes run in two phases (validate every member, then commit)
//! and undo already committed members when a later commit fails.

mod records;
mod relationships;

use std::sync::Arc;

use futures::future::try_join_all;
use jsonapi_query::{
    KeyFormatter, OperationContext, ParameterValidator, RequestLimits, ResourceId, ResourceSchema,
    SchemaRegistry,
};
use tracing::debug;

use super::error::DomainError;
use super::include::{IncludeResolver, IncludedSet};
use super::model::{FindQuery, Linkage, Record};
use super::payload::PayloadParser;
use super::repo::Repository;
use crate::config::EngineConfig;

pub use relationships::{KEYS_PARAM, RelationshipData};

/// Primary data of a successful operation.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimaryData {
    /// Addressed by a single id or a singleton lookup.
    Single(Record),
    Collection(Vec<Record>),
}

impl PrimaryData {
    #[must_use]
    pub fn records(&self) -> &[Record] {
        match self {
            PrimaryData::Single(record) => std::slice::from_ref(record),
            PrimaryData::Collection(records) => records,
        }
    }
}

/// Everything the serializer needs to render one response.
#[derive(Debug)]
pub struct ResultSet {
    pub primary: PrimaryData,
    pub included: IncludedSet,
    pub context: OperationContext,
}

/// Domain service executing JSON:API operations against a repository.
pub struct ResourceService {
    registry: Arc<SchemaRegistry>,
    repo: Arc<dyn Repository>,
    keys: KeyFormatter,
    limits: RequestLimits,
}

impl ResourceService {
    #[must_use]
    pub fn new(
        registry: Arc<SchemaRegistry>,
        repo: Arc<dyn Repository>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            repo,
            keys: KeyFormatter::new(config.key_format),
            limits: config.limits.clone(),
        }
    }

    /// Replace the configured key convention, e.g. with a custom one.
    #[must_use]
    pub fn with_key_formatter(mut self, keys: KeyFormatter) -> Self {
        self.keys = keys;
        self
    }

    #[must_use]
    pub fn keys(&self) -> &KeyFormatter {
        &self.keys
    }

    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn validator(&self) -> ParameterValidator<'_> {
        ParameterValidator::new(&self.registry, &self.keys, &self.limits)
    }

    fn payloads(&self) -> PayloadParser<'_> {
        PayloadParser::new(&self.registry, &self.keys)
    }

    fn schema(&self, resource_type: &str) -> Result<Arc<ResourceSchema>, DomainError> {
        self.registry
            .get(resource_type)
            .cloned()
            .ok_or_else(|| {
                DomainError::query(jsonapi_query::Error::InvalidResource {
                    resource: self.keys.format(resource_type),
                })
            })
    }

    /// Load explicitly addressed records in request order; all or nothing.
    async fn load_existing(
        &self,
        schema: &ResourceSchema,
        ids: &[ResourceId],
    ) -> Result<Vec<Record>, DomainError> {
        let found = self
            .repo
            .find(schema, &FindQuery::by_ids(ids.to_vec()))
            .await?;
        order_by_ids(found, ids)
    }

    /// Fail with every linked record of `linkages` that does not exist.
    ///
    /// One batched lookup per actual related type; missing ids are reported
    /// in first-seen order.
    async fn ensure_targets_exist<'l>(
        &self,
        linkages: impl IntoIterator<Item = &'l Linkage>,
    ) -> Result<(), DomainError> {
        let mut wanted: Vec<(&str, Vec<ResourceId>)> = Vec::new();
        for target in linkages.into_iter().flat_map(Linkage::refs) {
            match wanted
                .iter_mut()
                .find(|(ty, _)| *ty == target.resource_type)
            {
                Some((_, ids)) if ids.contains(&target.id) => {}
                Some((_, ids)) => ids.push(target.id.clone()),
                None => wanted.push((target.resource_type.as_str(), vec![target.id.clone()])),
            }
        }
        if wanted.is_empty() {
            return Ok(());
        }

        let lookups = wanted.into_iter().map(|(resource_type, ids)| async move {
            let schema = self.schema(resource_type)?;
            let found = self
                .repo
                .find(&schema, &FindQuery::by_ids(ids.clone()))
                .await?;
            Ok::<_, DomainError>(
                ids.into_iter()
                    .filter(|id| !found.iter().any(|r| r.id == *id))
                    .collect::<Vec<_>>(),
            )
        });
        let missing: Vec<ResourceId> = try_join_all(lookups)
            .await?
            .into_iter()
            .flatten()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            debug!(count = missing.len(), "linked records not found");
            Err(DomainError::NotFound(missing))
        }
    }

    async fn assemble(
        &self,
        primary: PrimaryData,
        context: OperationContext,
    ) -> Result<ResultSet, DomainError> {
        let included = IncludeResolver::new(&self.registry, self.repo.as_ref())
            .resolve(primary.records(), context.include())
            .await?;
        Ok(ResultSet {
            primary,
            included,
            context,
        })
    }
}

/// Arrange `records` in the order of `ids`; missing ids fail the whole lookup.
fn order_by_ids(records: Vec<Record>, ids: &[ResourceId]) -> Result<Vec<Record>, DomainError> {
    let mut slots: Vec<Option<Record>> = vec![None; ids.len()];
    for record in records {
        if let Some(pos) = ids.iter().position(|id| *id == record.id) {
            slots[pos] = Some(record);
        }
    }

    let missing: Vec<ResourceId> = ids
        .iter()
        .zip(&slots)
        .filter(|(_, slot)| slot.is_none())
        .map(|(id, _)| id.clone())
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::NotFound(missing));
    }
    Ok(slots.into_iter().flatten().collect())
}

/// Fail with every id of `ids` that has no counterpart in `records`.
fn ensure_found(records: &[Record], ids: &[ResourceId]) -> Result<(), DomainError> {
    let missing: Vec<ResourceId> = ids
        .iter()
        .filter(|id| !records.iter().any(|r| r.id == **id))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DomainError::NotFound(missing))
    }
}

/// Empty linkage of the right cardinality for a relationship.
fn empty_linkage(schema: &ResourceSchema, relationship: &str) -> Linkage {
    match schema.relationship(relationship) {
        Some(rel) if rel.is_to_many() => Linkage::ToMany(Vec::new()),
        _ => Linkage::ToOne(None),
    }
}
