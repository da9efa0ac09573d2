use jsonapi_query::{Error as QueryError, Operation, RawParams, ResourceId, ResourceSchema};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use super::{PrimaryData, ResourceService, ResultSet, ensure_found, order_by_ids};
use crate::domain::error::DomainError;
use crate::domain::model::{Changeset, FindQuery, Record};
use crate::domain::payload::WriteMode;

impl ResourceService {
    /// Collection query, optionally restricted to explicit ids.
    ///
    /// # Errors
    /// Parameter errors, `NotFound` for explicit ids that do not exist, or a
    /// repository failure.
    #[instrument(skip(self, params))]
    pub async fn list(
        &self,
        resource_type: &str,
        params: &RawParams,
    ) -> Result<ResultSet, DomainError> {
        let ctx = self
            .validator()
            .validate(Operation::List, resource_type, params)?;
        let schema = self.schema(resource_type)?;

        let query = FindQuery {
            ids: (!ctx.ids().is_empty()).then(|| ctx.ids().to_vec()),
            filters: ctx.filters().clone(),
            sort: ctx.sort().to_vec(),
        };
        let mut records = self.repo.find(&schema, &query).await?;

        if !ctx.ids().is_empty() {
            records = if ctx.sort().is_empty() {
                order_by_ids(records, ctx.ids())?
            } else {
                ensure_found(&records, ctx.ids())?;
                records
            };
        }
        debug!(count = records.len(), "records listed");

        self.assemble(PrimaryData::Collection(records), ctx).await
    }

    /// Show one or more records by id, or the single record of a singleton type.
    ///
    /// # Errors
    /// Parameter errors, `NotFound` when any addressed id does not exist, or a
    /// repository failure.
    #[instrument(skip(self, params))]
    pub async fn fetch(
        &self,
        resource_type: &str,
        params: &RawParams,
    ) -> Result<ResultSet, DomainError> {
        let ctx = self
            .validator()
            .validate(Operation::Fetch, resource_type, params)?;
        let schema = self.schema(resource_type)?;

        let primary = if ctx.ids().is_empty() {
            if !schema.is_singleton() {
                let key = self.keys.format(schema.key_param());
                return Err(QueryError::param_missing(key).into());
            }
            let record = self
                .repo
                .find(&schema, &FindQuery::all())
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    DomainError::Internal(anyhow::anyhow!(
                        "singleton `{resource_type}` has no record"
                    ))
                })?;
            PrimaryData::Single(record)
        } else {
            let mut records = self.load_existing(&schema, ctx.ids()).await?;
            match records.pop() {
                Some(record) if records.is_empty() => PrimaryData::Single(record),
                Some(record) => {
                    records.push(record);
                    PrimaryData::Collection(records)
                }
                None => PrimaryData::Collection(records),
            }
        };

        self.assemble(primary, ctx).await
    }

    /// Create one record, or a batch when the body holds an array.
    ///
    /// # Errors
    /// `ParamMissing` without a body, parameter and payload errors,
    /// `Validation` when any member violates a rule, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn create(
        &self,
        resource_type: &str,
        params: &RawParams,
    ) -> Result<ResultSet, DomainError> {
        let schema = self.schema(resource_type)?;
        let body = self.body(&schema, params)?;
        let (objects, single) = split_body(body);

        let mut errors = Vec::new();
        let ctx = match self
            .validator()
            .validate(Operation::Create, resource_type, params)
        {
            Ok(ctx) => Some(ctx),
            Err(errs) => {
                errors.extend(errs);
                None
            }
        };
        let changesets = self.parse_all(&schema, WriteMode::Create, &objects, &mut errors);
        let Some(ctx) = ctx.filter(|_| errors.is_empty()) else {
            return Err(DomainError::Query(errors));
        };

        let mut violations = Vec::new();
        for changes in &changesets {
            violations.extend(self.repo.validate(&schema, changes, None).await?);
        }
        if !violations.is_empty() {
            debug!(count = violations.len(), "create rejected by validation");
            return Err(DomainError::Validation(violations));
        }
        self.ensure_targets_exist(changesets.iter().flat_map(|c| c.relationships.values()))
            .await?;

        let mut created: Vec<Record> = Vec::with_capacity(changesets.len());
        for changes in &changesets {
            match self.repo.create(&schema, changes).await {
                Ok(record) => created.push(record),
                Err(e) => {
                    self.undo_creates(&schema, &created).await;
                    return Err(e.into());
                }
            }
        }
        info!(count = created.len(), "records created");

        let primary = match (single, created.pop()) {
            (true, Some(record)) => PrimaryData::Single(record),
            (_, last) => {
                created.extend(last);
                PrimaryData::Collection(created)
            }
        };
        self.assemble(primary, ctx).await
    }

    /// Update records addressed by ids with positionally matched payloads.
    ///
    /// # Errors
    /// `ParamMissing`, `CountMismatch`, `KeyNotIncludedInUrl`, `KeyRequired`,
    /// payload errors, `NotFound`, `Validation`, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn update(
        &self,
        resource_type: &str,
        params: &RawParams,
    ) -> Result<ResultSet, DomainError> {
        let schema = self.schema(resource_type)?;
        let body = self.body(&schema, params)?;
        let ctx = self
            .validator()
            .validate(Operation::Update, resource_type, params)?;
        let (objects, single) = split_body(body);
        let ids = ctx.ids().to_vec();

        if objects.len() != ids.len() {
            return Err(DomainError::CountMismatch);
        }
        check_keys(&schema, &objects, &ids, single)?;

        let mut errors = Vec::new();
        let mut changesets = self.parse_all(&schema, WriteMode::Update, &objects, &mut errors);
        if !errors.is_empty() {
            return Err(DomainError::Query(errors));
        }
        for (changes, id) in changesets.iter_mut().zip(&ids) {
            changes.id = Some(id.clone());
        }

        let existing = self.load_existing(&schema, &ids).await?;

        let mut violations = Vec::new();
        for (changes, record) in changesets.iter().zip(&existing) {
            violations.extend(self.repo.validate(&schema, changes, Some(record)).await?);
        }
        if !violations.is_empty() {
            debug!(count = violations.len(), "update rejected by validation");
            return Err(DomainError::Validation(violations));
        }
        self.ensure_targets_exist(changesets.iter().flat_map(|c| c.relationships.values()))
            .await?;

        let mut updated = Vec::with_capacity(ids.len());
        for (changes, id) in changesets.iter().zip(&ids) {
            match self.repo.update(&schema, id, changes).await {
                Ok(record) => updated.push(record),
                Err(e) => {
                    self.restore_all(&schema, &existing[..updated.len()]).await;
                    return Err(e.into());
                }
            }
        }
        info!(count = updated.len(), "records updated");

        let primary = if single && updated.len() == 1 {
            PrimaryData::Single(updated.remove(0))
        } else {
            PrimaryData::Collection(updated)
        };
        self.assemble(primary, ctx).await
    }

    /// Delete every addressed record, or none of them.
    ///
    /// # Errors
    /// Parameter errors, `NotFound` when any id does not exist, `Locked` when
    /// the domain forbids deleting a record, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn delete(&self, resource_type: &str, params: &RawParams) -> Result<(), DomainError> {
        let ctx = self
            .validator()
            .validate(Operation::Delete, resource_type, params)?;
        let schema = self.schema(resource_type)?;
        let existing = self.load_existing(&schema, ctx.ids()).await?;

        for record in &existing {
            self.repo.check_delete(&schema, record).await?;
        }

        for (done, record) in existing.iter().enumerate() {
            if let Err(e) = self.repo.delete(&schema, &record.id).await {
                self.restore_all(&schema, &existing[..done]).await;
                return Err(e.into());
            }
        }
        info!(count = existing.len(), "records deleted");
        Ok(())
    }

    fn body<'p>(
        &self,
        schema: &ResourceSchema,
        params: &'p RawParams,
    ) -> Result<&'p Value, DomainError> {
        let key = self.keys.format(schema.type_name());
        params
            .get(&key)
            .ok_or_else(|| QueryError::param_missing(key).into())
    }

    fn parse_all(
        &self,
        schema: &ResourceSchema,
        mode: WriteMode,
        objects: &[&Value],
        errors: &mut Vec<QueryError>,
    ) -> Vec<Changeset> {
        let parser = self.payloads();
        let mut changesets = Vec::with_capacity(objects.len());
        for object in objects {
            match parser.parse(schema, mode, object) {
                Ok(changes) => changesets.push(changes),
                Err(errs) => errors.extend(errs),
            }
        }
        changesets
    }

    async fn undo_creates(&self, schema: &ResourceSchema, created: &[Record]) {
        for record in created.iter().rev() {
            if let Err(e) = self.repo.delete(schema, &record.id).await {
                warn!(error = %e, id = %record.id, "failed to undo create");
            }
        }
        if !created.is_empty() {
            warn!(count = created.len(), "batch create rolled back");
        }
    }

    async fn restore_all(&self, schema: &ResourceSchema, snapshots: &[Record]) {
        for record in snapshots.iter().rev() {
            if let Err(e) = self.repo.restore(schema, record.clone()).await {
                warn!(error = %e, id = %record.id, "failed to restore record");
            }
        }
        if !snapshots.is_empty() {
            warn!(count = snapshots.len(), "batch write rolled back");
        }
    }
}

/// Resource objects of a body and whether it was a single object.
fn split_body(body: &Value) -> (Vec<&Value>, bool) {
    match body {
        Value::Array(items) => (items.iter().collect(), false),
        other => (vec![other], true),
    }
}

/// Positional key matching between URL ids and payload keys.
fn check_keys(
    schema: &ResourceSchema,
    objects: &[&Value],
    ids: &[ResourceId],
    single: bool,
) -> Result<(), DomainError> {
    for (object, id) in objects.iter().zip(ids) {
        match object.get(jsonapi_query::ID_FIELD) {
            None if single => {}
            None => return Err(DomainError::KeyRequired),
            Some(raw) => {
                if schema.id_kind().from_json(raw).as_ref() != Some(id) {
                    let shown = match raw {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return Err(DomainError::KeyNotIncludedInUrl(shown));
                }
            }
        }
    }
    Ok(())
}
