//! The remote collaborator contract and its REST implementation.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{EntityId, Page, PageRequest, Record, Resource},
    error::ApiError,
    protocol::{ApiEnvelope, ErrorBody, RecordPage},
};
use tracing::{debug, warn};

use crate::{
    config::ClientSettings,
    error::{ConfigError, FetchError},
};

/// Every remote call the controllers make. Reads are idempotent and may be
/// issued repeatedly with their results thrown away; the write calls are only
/// issued behind a controller guard.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    async fn fetch_page(
        &self,
        resource: Resource,
        request: &PageRequest,
    ) -> Result<Page<Record>, FetchError>;
    async fn fetch_related(
        &self,
        parent: Resource,
        parent_id: EntityId,
        child: Resource,
    ) -> Result<Vec<Record>, FetchError>;
    async fn fetch_one(&self, resource: Resource, id: EntityId) -> Result<Record, FetchError>;
    async fn submit_reassign_and_delete(
        &self,
        target_id: EntityId,
        replacement_id: EntityId,
    ) -> Result<(), FetchError>;
    async fn create(
        &self,
        resource: Resource,
        owner: Option<EntityId>,
        payload: Value,
    ) -> Result<Record, FetchError>;
    async fn update(
        &self,
        resource: Resource,
        id: EntityId,
        payload: Value,
    ) -> Result<Record, FetchError>;
    async fn fetch_departments(&self) -> Result<Vec<String>, FetchError>;
}

#[derive(Serialize)]
struct ReassignQuery {
    #[serde(rename = "newEmployeeId")]
    new_employee_id: i64,
}

#[derive(Serialize)]
struct OwnerQuery {
    #[serde(rename = "employeeId")]
    employee_id: i64,
}

pub struct HttpResourceApi {
    http: Client,
    base_url: String,
}

impl HttpResourceApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| ConfigError::HttpClient(err.to_string()))?;
        Ok(Self::with_client(http, settings.api_base_url.clone()))
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.base_url.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, FetchError> {
        let response = request
            .send()
            .await
            .map_err(|err| FetchError::NetworkUnreachable(err.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap_or_default();
        Err(rejection(status, &body))
    }

    async fn envelope_data<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, FetchError> {
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::NetworkUnreachable(err.to_string()))?;
        let envelope: ApiEnvelope<Value> =
            serde_json::from_slice(&body).map_err(|err| undecodable(&body, err))?;
        if !envelope.is_success() {
            return Err(rejection(envelope.status_code, &body));
        }
        serde_json::from_value(envelope.data)
            .map_err(|err| FetchError::ShapeMismatch(err.to_string()))
    }
}

/// A body that is not an envelope may still be an error report carrying a
/// failing `statusCode`.
fn undecodable(body: &[u8], err: serde_json::Error) -> FetchError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody {
            status_code: Some(status),
            ..
        }) if !(200..300).contains(&status) => rejection(status, body),
        _ => FetchError::ShapeMismatch(err.to_string()),
    }
}

fn rejection(status: u16, body: &[u8]) -> FetchError {
    let parsed = serde_json::from_slice::<ErrorBody>(body).unwrap_or_else(|_| {
        warn!(status, "error response body is not a structured error");
        ErrorBody::default()
    });
    let message = parsed.message.unwrap_or_default();
    FetchError::ServerRejected(ApiError::new(status, message).with_violations(parsed.errors))
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    async fn fetch_page(
        &self,
        resource: Resource,
        request: &PageRequest,
    ) -> Result<Page<Record>, FetchError> {
        debug!(%resource, page = request.page, size = request.size, search = %request.search, "fetch page");
        let content: RecordPage = self
            .envelope_data(self.http.get(self.url(&[resource.path()])).query(request))
            .await?;
        Ok(content.into())
    }

    async fn fetch_related(
        &self,
        parent: Resource,
        parent_id: EntityId,
        child: Resource,
    ) -> Result<Vec<Record>, FetchError> {
        debug!(%parent, %parent_id, %child, "fetch related");
        let parent_id = parent_id.to_string();
        self.envelope_data(
            self.http
                .get(self.url(&[child.path(), "for", parent_id.as_str()])),
        )
        .await
    }

    async fn fetch_one(&self, resource: Resource, id: EntityId) -> Result<Record, FetchError> {
        let id = id.to_string();
        self.envelope_data(self.http.get(self.url(&[resource.path(), id.as_str()])))
            .await
    }

    async fn submit_reassign_and_delete(
        &self,
        target_id: EntityId,
        replacement_id: EntityId,
    ) -> Result<(), FetchError> {
        let target = target_id.to_string();
        self.send(
            self.http
                .delete(self.url(&[
                    Resource::Employees.path(),
                    target.as_str(),
                    "reassignAndDelete",
                ]))
                .query(&ReassignQuery {
                    new_employee_id: replacement_id.0,
                }),
        )
        .await?;
        Ok(())
    }

    async fn create(
        &self,
        resource: Resource,
        owner: Option<EntityId>,
        payload: Value,
    ) -> Result<Record, FetchError> {
        let mut request = self.http.post(self.url(&[resource.path()])).json(&payload);
        if let Some(owner) = owner {
            request = request.query(&OwnerQuery {
                employee_id: owner.0,
            });
        }
        self.envelope_data(request).await
    }

    async fn update(
        &self,
        resource: Resource,
        id: EntityId,
        payload: Value,
    ) -> Result<Record, FetchError> {
        let id = id.to_string();
        self.envelope_data(
            self.http
                .put(self.url(&[resource.path(), id.as_str()]))
                .json(&payload),
        )
        .await
    }

    async fn fetch_departments(&self) -> Result<Vec<String>, FetchError> {
        self.envelope_data(
            self.http
                .get(self.url(&[Resource::Employees.path(), "departments"])),
        )
        .await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
