//! Entry point of the engine: operation processors plus serialization.

use std::sync::Arc;

use jsonapi_query::{KeyFormatter, RawParams, SchemaRegistry};
use tracing::debug;

use super::document::DocumentSerializer;
use super::response::Response;
use crate::config::EngineConfig;
use crate::domain::error::DomainError;
use crate::domain::repo::Repository;
use crate::domain::service::{ResourceService, ResultSet};

/// JSON:API engine over one schema registry and one repository.
///
/// Every method maps onto one verb and never fails: problems come back as an
/// error document with the matching status.
pub struct Engine {
    service: ResourceService,
}

impl Engine {
    #[must_use]
    pub fn new(
        registry: impl Into<Arc<SchemaRegistry>>,
        repo: Arc<dyn Repository>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            service: ResourceService::new(registry.into(), repo, config),
        }
    }

    /// Use a custom key convention instead of the configured one.
    #[must_use]
    pub fn with_key_formatter(self, keys: KeyFormatter) -> Self {
        Self {
            service: self.service.with_key_formatter(keys),
        }
    }

    #[must_use]
    pub fn service(&self) -> &ResourceService {
        &self.service
    }

    pub async fn list(&self, resource_type: &str, params: &RawParams) -> Response {
        let result = self.service.list(resource_type, params).await;
        self.render(result, Response::ok)
    }

    pub async fn fetch(&self, resource_type: &str, params: &RawParams) -> Response {
        let result = self.service.fetch(resource_type, params).await;
        self.render(result, Response::ok)
    }

    pub async fn create(&self, resource_type: &str, params: &RawParams) -> Response {
        let result = self.service.create(resource_type, params).await;
        self.render(result, Response::created)
    }

    pub async fn update(&self, resource_type: &str, params: &RawParams) -> Response {
        let result = self.service.update(resource_type, params).await;
        self.render(result, Response::ok)
    }

    pub async fn delete(&self, resource_type: &str, params: &RawParams) -> Response {
        Self::empty(self.service.delete(resource_type, params).await)
    }

    pub async fn fetch_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Response {
        match self
            .service
            .fetch_relationship(resource_type, parent_id, relationship, params)
            .await
        {
            Ok(data) => Response::ok(self.serializer().serialize_relationship(&data)),
            Err(e) => Self::failed(e),
        }
    }

    pub async fn replace_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Response {
        Self::empty(
            self.service
                .replace_relationship(resource_type, parent_id, relationship, params)
                .await,
        )
    }

    pub async fn add_to_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Response {
        Self::empty(
            self.service
                .add_to_relationship(resource_type, parent_id, relationship, params)
                .await,
        )
    }

    pub async fn remove_from_relationship(
        &self,
        resource_type: &str,
        parent_id: &str,
        relationship: &str,
        params: &RawParams,
    ) -> Response {
        Self::empty(
            self.service
                .remove_from_relationship(resource_type, parent_id, relationship, params)
                .await,
        )
    }

    fn serializer(&self) -> DocumentSerializer<'_> {
        DocumentSerializer::new(self.service.registry(), self.service.keys())
    }

    fn render(
        &self,
        result: Result<ResultSet, DomainError>,
        success: fn(serde_json::Value) -> Response,
    ) -> Response {
        match result.and_then(|set| self.serializer().serialize(&set)) {
            Ok(document) => success(document),
            Err(e) => Self::failed(e),
        }
    }

    fn empty(result: Result<(), DomainError>) -> Response {
        match result {
            Ok(()) => Response::no_content(),
            Err(e) => Self::failed(e),
        }
    }

    fn failed(err: DomainError) -> Response {
        let response = Response::from_error(err);
        debug!(status = %response.status, errors = response.errors().len(), "request failed");
        response
    }
}
