//! Breadth-first resolution of include paths.
//!
//! Paths are merged into a trie and walked one relationship hop at a time.
//! Every hop issues at most one batched repository call per relationship and
//! actual related type; calls of the same depth run concurrently and are merged
//! in path declaration order. A `(type, id)` seen once, primary records
//! included, is never fetched or emitted again.

use std::collections::{HashMap, HashSet};

use futures::future::try_join_all;
use jsonapi_query::{ResourceId, SchemaRegistry};
use tracing::debug;

use super::error::DomainError;
use super::model::{Record, RecordRef};
use super::repo::Repository;

#[derive(Debug, Default)]
struct IncludeNode {
    children: Vec<(String, IncludeNode)>,
}

impl IncludeNode {
    fn from_paths(paths: &[String]) -> Self {
        let mut root = IncludeNode::default();
        for path in paths {
            let mut node = &mut root;
            for seg in path.split('.') {
                let pos = match node.children.iter().position(|(name, _)| name == seg) {
                    Some(pos) => pos,
                    None => {
                        node.children.push((seg.to_owned(), IncludeNode::default()));
                        node.children.len() - 1
                    }
                };
                node = &mut node.children[pos].1;
            }
        }
        root
    }
}

/// Included records in discovery order, free of duplicates.
#[derive(Debug, Default)]
pub struct IncludedSet {
    records: Vec<Record>,
}

impl IncludedSet {
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records grouped by their actual type, types in first-seen order.
    #[must_use]
    pub fn by_type(&self) -> Vec<(&str, Vec<&Record>)> {
        let mut groups: Vec<(&str, Vec<&Record>)> = Vec::new();
        for record in &self.records {
            match groups
                .iter_mut()
                .find(|(ty, _)| *ty == record.resource_type)
            {
                Some((_, members)) => members.push(record),
                None => groups.push((record.resource_type.as_str(), vec![record])),
            }
        }
        groups
    }
}

/// One relationship hop: the refs reached through `relationship` from a parent set.
struct Step<'n> {
    targets: Vec<RecordRef>,
    node: &'n IncludeNode,
}

pub struct IncludeResolver<'a> {
    registry: &'a SchemaRegistry,
    repo: &'a dyn Repository,
}

impl<'a> IncludeResolver<'a> {
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, repo: &'a dyn Repository) -> Self {
        Self { registry, repo }
    }

    /// Resolve canonical include `paths` starting from `primary`.
    ///
    /// # Errors
    /// `NotFound` when a linked record does not exist, or a repository failure.
    pub async fn resolve(
        &self,
        primary: &[Record],
        paths: &[String],
    ) -> Result<IncludedSet, DomainError> {
        let mut included = IncludedSet::default();
        if paths.is_empty() || primary.is_empty() {
            return Ok(included);
        }

        let root = IncludeNode::from_paths(paths);
        let mut seen: HashSet<RecordRef> = primary.iter().map(Record::record_ref).collect();
        let mut cache: HashMap<RecordRef, Record> = primary
            .iter()
            .map(|r| (r.record_ref(), r.clone()))
            .collect();

        let mut level = vec![Step {
            targets: primary.iter().map(Record::record_ref).collect(),
            node: &root,
        }];
        let mut depth = 0_usize;

        while !level.is_empty() {
            depth += 1;
            let steps: Vec<Step<'_>> = level
                .iter()
                .flat_map(|parent| {
                    parent.node.children.iter().map(|(relationship, child)| Step {
                        targets: Self::linked(&cache, &parent.targets, relationship),
                        node: child,
                    })
                })
                .collect();

            self.fetch_missing(&steps, &mut cache).await?;

            for step in &steps {
                for target in &step.targets {
                    let record = cache
                        .get(target)
                        .ok_or_else(|| DomainError::not_found(target.id.clone()))?;
                    if seen.insert(target.clone()) {
                        included.records.push(record.clone());
                    }
                }
            }
            debug!(depth, included = included.len(), "include level resolved");

            level = steps
                .into_iter()
                .filter(|s| !s.node.children.is_empty() && !s.targets.is_empty())
                .collect();
        }

        Ok(included)
    }

    /// Refs linked through `relationship` from `parents`, deduplicated in order.
    fn linked(
        cache: &HashMap<RecordRef, Record>,
        parents: &[RecordRef],
        relationship: &str,
    ) -> Vec<RecordRef> {
        let mut out: Vec<RecordRef> = Vec::new();
        for parent in parents {
            let Some(linkage) = cache.get(parent).and_then(|r| r.linkage(relationship)) else {
                continue;
            };
            for target in linkage.refs() {
                if !out.contains(target) {
                    out.push(target.clone());
                }
            }
        }
        out
    }

    /// Plan one batch per (step, actual type) for refs not cached yet, run the
    /// batches concurrently, then merge them into the cache in plan order.
    async fn fetch_missing(
        &self,
        steps: &[Step<'_>],
        cache: &mut HashMap<RecordRef, Record>,
    ) -> Result<(), DomainError> {
        let mut planned: HashSet<&RecordRef> = HashSet::new();
        let mut batches: Vec<(&str, Vec<ResourceId>)> = Vec::new();

        for step in steps {
            let first_batch = batches.len();
            for target in &step.targets {
                if cache.contains_key(target) || !planned.insert(target) {
                    continue;
                }
                match batches[first_batch..]
                    .iter_mut()
                    .find(|(ty, _)| *ty == target.resource_type)
                {
                    Some((_, ids)) => ids.push(target.id.clone()),
                    None => batches.push((target.resource_type.as_str(), vec![target.id.clone()])),
                }
            }
        }
        if batches.is_empty() {
            return Ok(());
        }

        let fetches = batches.iter().map(|(ty, ids)| async move {
            let schema = self.registry.require(ty).map_err(DomainError::from)?;
            self.repo
                .fetch_related(schema, ids)
                .await
                .map_err(DomainError::from)
        });
        let fetched = try_join_all(fetches).await?;

        for record in fetched.into_iter().flatten() {
            cache.entry(record.record_ref()).or_insert(record);
        }
        Ok(())
    }
}
