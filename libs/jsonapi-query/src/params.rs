//! Validation of raw request parameters against a resource schema.
//!
//! Every parameter is checked independently and all failures are reported
//! together, in the order the parameters were supplied.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::{OperationContext, SortDir, SortKey};
use crate::key_format::KeyFormatter;
use crate::limits::RequestLimits;
use crate::schema::{ResourceSchema, SchemaRegistry};
use crate::value::ResourceId;
use crate::Error;

/// Raw parameters as they arrive from the transport, wire keys untouched.
pub type RawParams = Map<String, Value>;

pub const INCLUDE_PARAM: &str = "include";
pub const FIELDS_PARAM: &str = "fields";
pub const SORT_PARAM: &str = "sort";

/// Operation a parameter set is validated for. Decides which parameters are
/// reserved and which are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    List,
    Fetch,
    Create,
    Update,
    Delete,
}

impl Operation {
    fn accepts_ids(self) -> bool {
        !matches!(self, Operation::Create)
    }

    fn accepts_projection(self) -> bool {
        !matches!(self, Operation::Delete)
    }

    fn has_body(self) -> bool {
        matches!(self, Operation::Create | Operation::Update)
    }
}

/// Split a parameter value into trimmed, non-empty segments.
///
/// Strings are comma-separated; arrays contribute each element (strings inside
/// are split as well); scalars contribute their textual form.
#[must_use]
pub fn segments(value: &Value) -> Option<Vec<String>> {
    fn push(out: &mut Vec<String>, value: &Value) -> bool {
        match value {
            Value::String(s) => {
                out.extend(
                    s.split(',')
                        .map(str::trim)
                        .filter(|seg| !seg.is_empty())
                        .map(str::to_owned),
                );
                true
            }
            Value::Number(n) => {
                out.push(n.to_string());
                true
            }
            Value::Bool(b) => {
                out.push(b.to_string());
                true
            }
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }

    let mut out = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                if !push(&mut out, item) {
                    return None;
                }
            }
        }
        other => {
            if !push(&mut out, other) {
                return None;
            }
        }
    }
    Some(out)
}

/// Stateless validator bound to the engine's registry, key convention and limits.
#[derive(Clone, Copy, Debug)]
pub struct ParameterValidator<'a> {
    registry: &'a SchemaRegistry,
    keys: &'a KeyFormatter,
    limits: &'a RequestLimits,
}

impl<'a> ParameterValidator<'a> {
    #[must_use]
    pub fn new(
        registry: &'a SchemaRegistry,
        keys: &'a KeyFormatter,
        limits: &'a RequestLimits,
    ) -> Self {
        Self {
            registry,
            keys,
            limits,
        }
    }

    /// Validate `params` for `operation` on `resource_type`.
    ///
    /// # Errors
    /// Returns every problem found, in parameter order.
    pub fn validate(
        &self,
        operation: Operation,
        resource_type: &str,
        params: &RawParams,
    ) -> Result<OperationContext, Vec<Error>> {
        let schema = self.schema(resource_type).map_err(|e| vec![e])?;
        let body_key = self.keys.format(schema.type_name());

        let mut ctx = OperationContext::new(schema.type_name());
        let mut errors = Vec::new();
        let mut ids_supplied = false;

        for (key, value) in params {
            if operation.accepts_ids() && self.is_id_param(schema, key) {
                ids_supplied = true;
                match self.parse_ids(schema, value) {
                    Ok(ids) => ctx = ctx.with_ids(ids),
                    Err(errs) => errors.extend(errs),
                }
            } else if operation.has_body() && *key == body_key {
                // consumed by the payload parser
            } else if operation.accepts_projection() && key == INCLUDE_PARAM {
                match self.parse_include(schema, value) {
                    Ok(paths) => ctx = paths.into_iter().fold(ctx, OperationContext::with_include),
                    Err(errs) => errors.extend(errs),
                }
            } else if operation.accepts_projection() && key == FIELDS_PARAM {
                match self.parse_fields(schema, value) {
                    Ok(fields) => {
                        ctx = fields
                            .into_iter()
                            .fold(ctx, |ctx, (ty, f)| ctx.with_fields(ty, f));
                    }
                    Err(errs) => errors.extend(errs),
                }
            } else if operation == Operation::List && key == SORT_PARAM {
                match self.parse_sort(schema, value) {
                    Ok(sort) => ctx = ctx.with_sort(sort),
                    Err(errs) => errors.extend(errs),
                }
            } else if operation == Operation::List {
                match self.parse_filter(schema, key, value) {
                    Ok((name, values)) => ctx = ctx.with_filter(name, values),
                    Err(errs) => errors.extend(errs),
                }
            } else {
                errors.push(Error::param_not_allowed(key.as_str()));
            }
        }

        let needs_ids = match operation {
            Operation::Update | Operation::Delete => true,
            Operation::Fetch => !schema.is_singleton(),
            Operation::List | Operation::Create => false,
        };
        if needs_ids && !ids_supplied {
            errors.push(Error::param_missing(self.keys.format(schema.key_param())));
        }

        if errors.is_empty() {
            debug!(resource_type, ?operation, "request parameters validated");
            Ok(ctx)
        } else {
            debug!(
                resource_type,
                ?operation,
                errors = errors.len(),
                "request parameters rejected"
            );
            Err(errors)
        }
    }

    /// Parse an id list (`"1,2"`, `3`, `["USD", "EUR"]`) per the schema's id kind.
    ///
    /// # Errors
    /// `ParamMissing` when no id is given, one `InvalidFilterValue` per
    /// segment that does not parse, or `LimitExceeded` when too many ids are
    /// addressed.
    pub fn parse_ids(
        &self,
        schema: &ResourceSchema,
        value: &Value,
    ) -> Result<Vec<ResourceId>, Vec<Error>> {
        let field = self.keys.format(schema.key_param());
        let Some(segs) = segments(value) else {
            return Err(vec![Error::InvalidFilterValue {
                value: value.to_string(),
                field,
            }]);
        };
        if segs.is_empty() {
            return Err(vec![Error::param_missing(field)]);
        }

        let mut ids = Vec::with_capacity(segs.len());
        let mut errors = Vec::new();
        for seg in segs {
            match schema.id_kind().parse(&seg) {
                Some(id) => ids.push(id),
                None => errors.push(Error::InvalidFilterValue {
                    value: seg,
                    field: field.clone(),
                }),
            }
        }
        if errors.is_empty() {
            self.limits.validate_ids(ids.len()).map_err(|e| vec![e])?;
            Ok(ids)
        } else {
            Err(errors)
        }
    }

    fn schema(&self, resource_type: &str) -> Result<&'a ResourceSchema, Error> {
        self.registry
            .get(resource_type)
            .map(Arc::as_ref)
            .ok_or_else(|| Error::InvalidResource {
                resource: self.keys.format(resource_type),
            })
    }

    fn is_id_param(&self, schema: &ResourceSchema, key: &str) -> bool {
        let key_param = self.keys.format(schema.key_param());
        key == "id" || key == "ids" || key == key_param || key == format!("{key_param}s")
    }

    fn parse_include(
        &self,
        schema: &ResourceSchema,
        value: &Value,
    ) -> Result<Vec<String>, Vec<Error>> {
        let Some(paths) = segments(value) else {
            return Err(vec![Error::InvalidInclude {
                relationship: value.to_string(),
                resource: self.keys.format(schema.type_name()),
            }]);
        };

        let mut valid = Vec::new();
        let mut errors = Vec::new();
        for path in &paths {
            match self.resolve_include_path(schema, path) {
                Ok(canonical) => valid.push(canonical),
                Err(e) => errors.push(e),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        self.limits
            .validate_include(valid.iter().map(String::as_str))
            .map_err(|e| vec![e])?;
        Ok(valid)
    }

    fn resolve_include_path(&self, root: &ResourceSchema, path: &str) -> Result<String, Error> {
        let mut current = root;
        let mut canonical = Vec::new();
        let mut segs = path.split('.').peekable();

        while let Some(seg) = segs.next() {
            let invalid = || Error::InvalidInclude {
                relationship: seg.to_owned(),
                resource: self.keys.format(current.type_name()),
            };
            let name = self.keys.unformat(seg).ok_or_else(invalid)?;
            let rel = current.relationship(&name).ok_or_else(invalid)?;
            canonical.push(name);

            if rel.polymorphic {
                if let Some(next) = segs.peek() {
                    return Err(Error::InvalidInclude {
                        relationship: (*next).to_owned(),
                        resource: self.keys.format(&rel.related_type),
                    });
                }
                break;
            }
            current = self.registry.require(&rel.related_type)?.as_ref();
        }
        Ok(canonical.join("."))
    }

    fn parse_fields(
        &self,
        schema: &ResourceSchema,
        value: &Value,
    ) -> Result<Vec<(String, Vec<String>)>, Vec<Error>> {
        let mut out = Vec::new();
        let mut errors = Vec::new();

        if let Value::Object(by_type) = value {
            for (type_key, list) in by_type {
                let target = self
                    .keys
                    .unformat(type_key)
                    .and_then(|name| self.registry.get(&name));
                match target {
                    Some(target) => match self.parse_field_list(target, list) {
                        Ok(fields) => out.push((target.type_name().to_owned(), fields)),
                        Err(errs) => errors.extend(errs),
                    },
                    None => errors.push(Error::InvalidResource {
                        resource: type_key.clone(),
                    }),
                }
            }
        } else {
            match self.parse_field_list(schema, value) {
                Ok(fields) => out.push((schema.type_name().to_owned(), fields)),
                Err(errs) => errors.extend(errs),
            }
        }

        if errors.is_empty() {
            Ok(out)
        } else {
            Err(errors)
        }
    }

    fn parse_field_list(
        &self,
        schema: &ResourceSchema,
        value: &Value,
    ) -> Result<Vec<String>, Vec<Error>> {
        let resource = self.keys.format(schema.type_name());
        let segs = segments(value).unwrap_or_default();
        if segs.is_empty() {
            return Err(vec![Error::InvalidField {
                field: "nil".to_owned(),
                resource,
            }]);
        }

        let mut fields = Vec::with_capacity(segs.len());
        let mut errors = Vec::new();
        for seg in segs {
            match self.keys.unformat(&seg) {
                Some(name) if schema.is_fetchable(&name) => {
                    if !fields.contains(&name) {
                        fields.push(name);
                    }
                }
                _ => errors.push(Error::InvalidField {
                    field: seg,
                    resource: resource.clone(),
                }),
            }
        }
        if errors.is_empty() {
            Ok(fields)
        } else {
            Err(errors)
        }
    }

    fn parse_sort(
        &self,
        schema: &ResourceSchema,
        value: &Value,
    ) -> Result<Vec<SortKey>, Vec<Error>> {
        let resource = self.keys.format(schema.type_name());
        let segs = segments(value).unwrap_or_default();

        let mut keys = Vec::with_capacity(segs.len());
        let mut errors = Vec::new();
        for seg in &segs {
            let (dir, name) = match seg.strip_prefix('-') {
                Some(name) => (SortDir::Desc, name),
                None => (SortDir::Asc, seg.strip_prefix('+').unwrap_or(seg)),
            };
            match self.keys.unformat(name) {
                Some(field) if schema.is_sortable(&field) => keys.push(SortKey { field, dir }),
                _ => errors.push(Error::InvalidSortParam {
                    param: name.to_owned(),
                    resource: resource.clone(),
                }),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        self.limits
            .validate_sort(keys.len())
            .map_err(|e| vec![e])?;
        Ok(keys)
    }

    fn parse_filter(
        &self,
        schema: &ResourceSchema,
        key: &str,
        value: &Value,
    ) -> Result<(String, Vec<String>), Vec<Error>> {
        let not_allowed = || {
            vec![Error::FilterNotAllowed {
                filter: key.to_owned(),
            }]
        };
        let name = self.keys.unformat(key).ok_or_else(not_allowed)?;
        let filter = schema.filter(&name).ok_or_else(not_allowed)?;

        // Relationship filters take id lists and are resolved by the repository.
        let values = if schema.relationship(&name).is_some() {
            segments(value)
        } else {
            match value {
                Value::String(s) => Some(vec![s.clone()]),
                Value::Array(_) => segments(value),
                Value::Number(_) | Value::Bool(_) => Some(vec![value.to_string()]),
                Value::Null | Value::Object(_) => None,
            }
        };
        let Some(values) = values else {
            return Err(vec![Error::InvalidFilterValue {
                value: value.to_string(),
                field: key.to_owned(),
            }]);
        };

        let errors: Vec<Error> = values
            .iter()
            .filter(|v| !filter.accepts(v))
            .map(|v| Error::InvalidFilterValue {
                value: v.clone(),
                field: key.to_owned(),
            })
            .collect();
        if errors.is_empty() {
            Ok((name, values))
        } else {
            Err(errors)
        }
    }
}
