use std::sync::Arc;

use jsonapi_query::{
    Error as QueryError, IdKind, RawParams, RelationshipDescriptor, ResourceId, ResourceSchema,
    params::segments,
};
use serde_json::Value;
use tracing::{debug, info, instrument};

use super::{ResourceService, empty_linkage};
use crate::domain::error::DomainError;
use crate::domain::model::{Changeset, Linkage, Record, RecordRef};

/// Name of the parameter listing members to remove from a to-many relationship.
pub const KEYS_PARAM: &str = "keys";

/// Current linkage of one relationship of one record.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationshipData {
    pub relationship: RelationshipDescriptor,
    pub linkage: Linkage,
}

/// A resolved relationship endpoint: owning schema, relationship and parent id.
struct Target {
    schema: Arc<ResourceSchema>,
    relationship: RelationshipDescriptor,
    parent_id: ResourceId,
}

impl ResourceService {
    /// Linkage of `relationship` on the record `parent_id` of `resource_type`.
    ///
    /// # Errors
    /// `InvalidField` for an unknown relationship, any parameter, `NotFound`
    /// for a missing parent, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn fetch_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Result<RelationshipData, DomainError> {
        let target = self.target(resource_type, parent_id, relationship)?;
        reject_extra(params, &[])?;
        let parent = self.load_parent(&target).await?;

        let linkage = parent
            .linkage(&target.relationship.name)
            .cloned()
            .unwrap_or_else(|| empty_linkage(&target.schema, &target.relationship.name));
        Ok(RelationshipData {
            relationship: target.relationship,
            linkage,
        })
    }

    /// Set a to-one relationship (an explicit `null` clears it) or replace the
    /// member set of a to-many relationship.
    ///
    /// # Errors
    /// `ParamMissing` without the data key, unpermitted parameters, invalid
    /// ids, `NotFound` for a missing parent, `Validation`, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn replace_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Result<(), DomainError> {
        let target = self.target(resource_type, parent_id, relationship)?;
        let linkage = self.linkage_param(&target, params)?;
        let parent = self.load_parent(&target).await?;

        self.commit(&target, &parent, linkage).await
    }

    /// Add members to a to-many relationship, or set a to-one relationship
    /// that is currently empty.
    ///
    /// # Errors
    /// `RelationExists` when any id is already a member, `ToOneRelationExists`
    /// when the to-one value is already set, plus everything
    /// [`Self::replace_relationship`] reports.
    #[instrument(skip(self, params))]
    pub async fn add_to_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Result<(), DomainError> {
        let target = self.target(resource_type, parent_id, relationship)?;
        let requested = self.linkage_param(&target, params)?;
        let parent = self.load_parent(&target).await?;
        let current = parent.linkage(&target.relationship.name);

        let linkage = match requested {
            Linkage::ToOne(value) => {
                if current.is_some_and(|l| !l.is_empty()) {
                    return Err(DomainError::ToOneRelationExists);
                }
                Linkage::ToOne(value)
            }
            Linkage::ToMany(added) => {
                let mut members: Vec<RecordRef> = current
                    .map(|l| l.refs().into_iter().cloned().collect())
                    .unwrap_or_default();
                for member in added {
                    if members.contains(&member) {
                        debug!(id = %member.id, "relation already present");
                        return Err(DomainError::RelationExists(member.id));
                    }
                    members.push(member);
                }
                Linkage::ToMany(members)
            }
        };

        self.commit(&target, &parent, linkage).await
    }

    /// Clear a to-one relationship, or remove the members named by `keys`
    /// from a to-many relationship.
    ///
    /// # Errors
    /// `ParamMissing` without `keys` on a to-many relationship, invalid keys,
    /// `NotFound` naming every key that is not a member, or a repository failure.
    #[instrument(skip(self, params))]
    pub async fn remove_from_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Result<(), DomainError> {
        let target = self.target(resource_type, parent_id, relationship)?;

        if !target.relationship.is_to_many() {
            reject_extra(params, &[])?;
            let parent = self.load_parent(&target).await?;
            return self.commit(&target, &parent, Linkage::ToOne(None)).await;
        }

        let raw = required(params, KEYS_PARAM)?;
        reject_extra(params, &[KEYS_PARAM])?;
        let keys = self.parse_keys(&target, raw)?;
        let parent = self.load_parent(&target).await?;

        let members: Vec<RecordRef> = parent
            .linkage(&target.relationship.name)
            .map(|l| l.refs().into_iter().cloned().collect())
            .unwrap_or_default();
        let missing: Vec<_> = keys
            .iter()
            .filter(|key| !members.iter().any(|m| m.id.to_string() == key.to_string()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DomainError::NotFound(missing));
        }

        let kept = members
            .into_iter()
            .filter(|m| !keys.iter().any(|key| key.to_string() == m.id.to_string()))
            .collect();
        self.commit(&target, &parent, Linkage::ToMany(kept)).await
    }

    fn target(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
    ) -> Result<Target, DomainError> {
        let schema = self.schema(resource_type)?;
        let descriptor = self
            .keys
            .unformat(relationship)
            .and_then(|name| schema.relationship(&name).cloned())
            .ok_or_else(|| QueryError::InvalidField {
                field: relationship.to_owned(),
                resource: self.keys.format(schema.type_name()),
            })?;
        let parent_id = schema
            .id_kind()
            .parse(parent_id)
            .ok_or_else(|| QueryError::InvalidFilterValue {
                value: parent_id.to_owned(),
                field: self.keys.format(schema.key_param()),
            })?;
        Ok(Target {
            schema,
            relationship: descriptor,
            parent_id,
        })
    }

    async fn load_parent(&self, target: &Target) -> Result<Record, DomainError> {
        self.load_existing(&target.schema, std::slice::from_ref(&target.parent_id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::not_found(target.parent_id.clone()))
    }

    /// The relationship's data parameter, keyed by the related type's wire name.
    fn linkage_param(&self, target: &Target, params: &RawParams) -> Result<Linkage, DomainError> {
        let key = self.keys.format(&target.relationship.related_type);
        let value = required(params, &key)?;
        reject_extra(params, &[key.as_str()])?;

        let linkage = self
            .payloads()
            .parse_linkage(&target.relationship, &key, value)?;
        if let Linkage::ToMany(members) = &linkage {
            self.limits.validate_ids(members.len())?;
        }
        Ok(linkage)
    }

    fn parse_keys(
        &self,
        target: &Target,
        raw: &Value,
    ) -> Result<Vec<ResourceId>, DomainError> {
        let invalid = |value: String| QueryError::InvalidFilterValue {
            value,
            field: KEYS_PARAM.to_owned(),
        };
        let kind = self
            .registry
            .get(&target.relationship.related_type)
            .map_or(IdKind::String, |s| s.id_kind());

        let segs = segments(raw).ok_or_else(|| invalid(raw.to_string()))?;
        if segs.is_empty() {
            return Err(QueryError::param_missing(KEYS_PARAM).into());
        }
        self.limits.validate_ids(segs.len())?;

        let mut keys = Vec::with_capacity(segs.len());
        let mut errors = Vec::new();
        for seg in segs {
            match kind.parse(&seg) {
                Some(id) => keys.push(id),
                None => errors.push(invalid(seg)),
            }
        }
        if errors.is_empty() {
            Ok(keys)
        } else {
            Err(errors.into())
        }
    }

    /// Validate then persist one relationship change on `parent`.
    async fn commit(
        &self,
        target: &Target,
        parent: &Record,
        linkage: Linkage,
    ) -> Result<(), DomainError> {
        let mut changes =
            Changeset::new().with_relationship(target.relationship.name.clone(), linkage);
        changes.id = Some(parent.id.clone());

        let violations = self
            .repo
            .validate(&target.schema, &changes, Some(parent))
            .await?;
        if !violations.is_empty() {
            return Err(DomainError::Validation(violations));
        }
        self.ensure_targets_exist(changes.relationships.values())
            .await?;

        self.repo
            .update(&target.schema, &parent.id, &changes)
            .await?;
        info!(
            relationship = %target.relationship.name,
            id = %parent.id,
            "relationship updated"
        );
        Ok(())
    }
}

fn required<'p>(params: &'p RawParams, key: &str) -> Result<&'p Value, DomainError> {
    params
        .get(key)
        .ok_or_else(|| QueryError::param_missing(key).into())
}

/// Every parameter outside `allowed` is reported, in parameter order.
fn reject_extra(params: &RawParams, allowed: &[&str]) -> Result<(), DomainError> {
    let errors: Vec<QueryError> = params
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .map(|key| QueryError::param_not_allowed(key.as_str()))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.into())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn params(value: Value) -> RawParams {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn missing_data_key_is_reported_before_extras() {
        let p = params(json!({"authors": 1}));
        let DomainError::Query(errs) = required(&p, "sections").unwrap_err() else {
            panic!("expected query errors");
        };
        assert_eq!(
            errs[0].to_string(),
            "The required parameter, sections, is missing."
        );
    }

    #[test]
    fn extra_parameters_are_all_reported() {
        let p = params(json!({"tags": [1], "foo": 1, "bar": 2}));
        let err = reject_extra(&p, &["tags"]).unwrap_err();
        let DomainError::Query(errs) = err else {
            panic!("expected query errors");
        };
        let messages: Vec<_> = errs.iter().map(ToString::to_string).collect();
        assert_eq!(messages, ["foo is not allowed.", "bar is not allowed."]);
    }
}
