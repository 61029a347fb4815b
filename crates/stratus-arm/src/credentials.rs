use std::collections::HashMap;

use serde::Deserialize;
use tokio::sync::Mutex;

use stratus_core::error::{format_err_chain, StratusError};

const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
const IMDS_API_VERSION: &str = "2018-02-01";

/// Service principal credentials, used when the instance metadata service
/// is unreachable (i.e. we are not running on an Azure VM with a managed
/// identity).
#[derive(Debug, Clone)]
pub struct ServicePrincipal {
    pub client_id: String,
    pub secret: String,
    pub tenant_id: String,
}

/// Acquires bearer tokens on first use and caches them per audience for
/// the lifetime of the provider instance.
///
/// Acquisition order: IMDS managed identity, then the service principal
/// client-credentials flow. Nothing happens at construction time — no
/// network call is made until [`CredentialProvider::acquire`] is invoked.
pub struct CredentialProvider {
    http: reqwest::Client,
    principal: Option<ServicePrincipal>,
    imds_endpoint: String,
    authority: String,
    cache: Mutex<HashMap<String, String>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl CredentialProvider {
    pub fn new(principal: Option<ServicePrincipal>) -> Self {
        Self::with_endpoints(principal, DEFAULT_IMDS_ENDPOINT, DEFAULT_AUTHORITY)
    }

    /// Override the IMDS and AAD endpoints (tests point these at a local
    /// mock server).
    pub fn with_endpoints(
        principal: Option<ServicePrincipal>,
        imds_endpoint: impl Into<String>,
        authority: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            principal,
            imds_endpoint: imds_endpoint.into(),
            authority: authority.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Bearer token for the given audience (e.g. the ARM endpoint or
    /// `https://vault.azure.net`).
    pub async fn acquire(&self, resource: &str) -> Result<String, StratusError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.get(resource) {
            return Ok(token.clone());
        }

        let token = match self.imds_token(resource).await {
            Ok(token) => token,
            Err(imds_err) => {
                tracing::debug!(
                    error = %imds_err,
                    "no managed identity token, falling back to service principal"
                );
                let principal = self.principal.as_ref().ok_or_else(|| {
                    StratusError::Credentials(format!(
                        "managed identity unavailable ({imds_err}) and no service principal configured"
                    ))
                })?;
                self.principal_token(principal, resource).await?
            }
        };

        cache.insert(resource.to_string(), token.clone());
        Ok(token)
    }

    async fn imds_token(&self, resource: &str) -> Result<String, String> {
        let response = self
            .http
            .get(&self.imds_endpoint)
            .header("Metadata", "true")
            .query(&[("api-version", IMDS_API_VERSION), ("resource", resource)])
            .send()
            .await
            .map_err(|e| format_err_chain(&e))?
            .error_for_status()
            .map_err(|e| format_err_chain(&e))?;

        let body: TokenResponse = response.json().await.map_err(|e| format_err_chain(&e))?;
        Ok(body.access_token)
    }

    async fn principal_token(
        &self,
        principal: &ServicePrincipal,
        resource: &str,
    ) -> Result<String, StratusError> {
        let url = format!("{}/{}/oauth2/token", self.authority, principal.tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", principal.client_id.as_str()),
            ("client_secret", principal.secret.as_str()),
            ("resource", resource),
        ];

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| StratusError::Credentials(format_err_chain(&e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StratusError::Credentials(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| StratusError::Credentials(format_err_chain(&e)))?;
        Ok(body.access_token)
    }
}
