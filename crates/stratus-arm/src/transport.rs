use std::sync::Arc;

use serde_json::Value;

use stratus_core::error::format_err_chain;
use stratus_core::{BoxFuture, ResourceId, StratusError};

use crate::credentials::CredentialProvider;

const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// Read/write interface between the reconciler and the provider API.
///
/// Absence is a value, not an error: `get` returns `Ok(None)` for a
/// missing resource and `delete` returns `Ok(false)` when there was
/// nothing to delete. Every other failure is a transport error carrying
/// the operation and resource identity.
pub trait ResourceTransport: Send + Sync {
    /// Fetch the current remote state. `None` means the resource does not
    /// exist.
    fn get<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StratusError>>;

    /// Full-replace PUT. The payload must carry every field, not only the
    /// changed ones.
    fn create_or_update<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<Value, StratusError>>;

    /// Delete. `Ok(false)` when the resource was already gone.
    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
    ) -> BoxFuture<'a, Result<bool, StratusError>>;

    /// List a resource collection (e.g. all autoscale settings in a
    /// resource group, all elastic pools under a server). `filter` is an
    /// optional OData `$filter` expression for collections that support
    /// one (database metrics).
    fn list<'a>(
        &'a self,
        collection_path: &'a str,
        api_version: &'a str,
        filter: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Value>, StratusError>>;
}

/// REST transport against the ARM endpoint.
pub struct ArmTransport {
    http: reqwest::Client,
    credentials: Arc<CredentialProvider>,
    endpoint: String,
    token_resource: String,
}

impl ArmTransport {
    pub fn new(credentials: Arc<CredentialProvider>) -> Self {
        Self::with_endpoint(credentials, DEFAULT_ARM_ENDPOINT)
    }

    /// Point the transport (and its token audience) at a non-default
    /// endpoint — sovereign clouds, or a mock server in tests.
    pub fn with_endpoint(credentials: Arc<CredentialProvider>, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        Self {
            http: reqwest::Client::new(),
            credentials,
            token_resource: endpoint.clone(),
            endpoint,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    async fn bearer(&self) -> Result<String, StratusError> {
        self.credentials.acquire(&self.token_resource).await
    }
}

/// Pull the human-readable message out of an ARM error body, falling back
/// to the raw text.
fn arm_error_message(status: reqwest::StatusCode, body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string());
    format!("{status}: {message}")
}

impl ResourceTransport for ArmTransport {
    fn get<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
    ) -> BoxFuture<'a, Result<Option<Value>, StratusError>> {
        Box::pin(async move {
            let token = self.bearer().await?;
            let response = self
                .http
                .get(self.url(&id.path()))
                .bearer_auth(token)
                .query(&[("api-version", api_version)])
                .send()
                .await
                .map_err(|e| StratusError::transport("get", id, format_err_chain(&e)))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!(resource = %id, "resource not found");
                return Ok(None);
            }
            let body = response
                .text()
                .await
                .map_err(|e| StratusError::transport("get", id, format_err_chain(&e)))?;
            if !status.is_success() {
                return Err(StratusError::transport(
                    "get",
                    id,
                    arm_error_message(status, &body),
                ));
            }

            let value = serde_json::from_str(&body)
                .map_err(|e| StratusError::transport("get", id, e.to_string()))?;
            Ok(Some(value))
        })
    }

    fn create_or_update<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, Result<Value, StratusError>> {
        Box::pin(async move {
            let token = self.bearer().await?;
            tracing::debug!(resource = %id, "issuing create_or_update");
            let response = self
                .http
                .put(self.url(&id.path()))
                .bearer_auth(token)
                .query(&[("api-version", api_version)])
                .json(payload)
                .send()
                .await
                .map_err(|e| {
                    StratusError::transport("create_or_update", id, format_err_chain(&e))
                })?;

            let status = response.status();
            let body = response.text().await.map_err(|e| {
                StratusError::transport("create_or_update", id, format_err_chain(&e))
            })?;
            if !status.is_success() {
                return Err(StratusError::transport(
                    "create_or_update",
                    id,
                    arm_error_message(status, &body),
                ));
            }

            // Accepted (202) responses may carry no body; the submitted
            // payload is the best available echo of the new state.
            match serde_json::from_str(&body) {
                Ok(value) => Ok(value),
                Err(_) => Ok(payload.clone()),
            }
        })
    }

    fn delete<'a>(
        &'a self,
        id: &'a ResourceId,
        api_version: &'a str,
    ) -> BoxFuture<'a, Result<bool, StratusError>> {
        Box::pin(async move {
            let token = self.bearer().await?;
            tracing::debug!(resource = %id, "issuing delete");
            let response = self
                .http
                .delete(self.url(&id.path()))
                .bearer_auth(token)
                .query(&[("api-version", api_version)])
                .send()
                .await
                .map_err(|e| StratusError::transport("delete", id, format_err_chain(&e)))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                tracing::debug!(resource = %id, "already absent, nothing to delete");
                return Ok(false);
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(StratusError::transport(
                    "delete",
                    id,
                    arm_error_message(status, &body),
                ));
            }
            Ok(true)
        })
    }

    fn list<'a>(
        &'a self,
        collection_path: &'a str,
        api_version: &'a str,
        filter: Option<&'a str>,
    ) -> BoxFuture<'a, Result<Vec<Value>, StratusError>> {
        Box::pin(async move {
            let token = self.bearer().await?;
            let mut query = vec![("api-version", api_version)];
            if let Some(filter) = filter {
                query.push(("$filter", filter));
            }
            let response = self
                .http
                .get(self.url(collection_path))
                .bearer_auth(token)
                .query(&query)
                .send()
                .await
                .map_err(|e| {
                    StratusError::transport("list", collection_path, format_err_chain(&e))
                })?;

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| StratusError::transport("list", collection_path, format_err_chain(&e)))?;
            if !status.is_success() {
                return Err(StratusError::transport(
                    "list",
                    collection_path,
                    arm_error_message(status, &body),
                ));
            }

            let value: Value = serde_json::from_str(&body)
                .map_err(|e| StratusError::transport("list", collection_path, e.to_string()))?;
            let items = value
                .get("value")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(items)
        })
    }
}
