use std::sync::Arc;

use serde_json::Value;

use stratus_core::error::format_err_chain;
use stratus_core::StratusError;

use crate::credentials::CredentialProvider;

/// Token audience for Key Vault data-plane calls.
pub const VAULT_TOKEN_RESOURCE: &str = "https://vault.azure.net";

const SECRETS_API_VERSION: &str = "2016-10-01";

/// Key Vault secret retrieval.
///
/// Credentials come from the shared [`CredentialProvider`] and are only
/// acquired on the first `get_secret` call, never at construction.
pub struct KeyVaultClient {
    http: reqwest::Client,
    credentials: Arc<CredentialProvider>,
    token_resource: String,
}

impl KeyVaultClient {
    pub fn new(credentials: Arc<CredentialProvider>) -> Self {
        Self::with_token_resource(credentials, VAULT_TOKEN_RESOURCE)
    }

    pub fn with_token_resource(
        credentials: Arc<CredentialProvider>,
        token_resource: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token_resource: token_resource.into(),
        }
    }

    /// Fetch one secret's value. `Ok(None)` when the vault has no secret
    /// by that name — a missing secret is absence, not an empty string
    /// and not an error.
    pub async fn get_secret(
        &self,
        vault_url: &str,
        name: &str,
    ) -> Result<Option<String>, StratusError> {
        let token = self.credentials.acquire(&self.token_resource).await?;
        let url = format!("{}/secrets/{}", vault_url.trim_end_matches('/'), name);
        let resource = format!("{vault_url} secret {name}");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[("api-version", SECRETS_API_VERSION)])
            .send()
            .await
            .map_err(|e| StratusError::transport("get_secret", &resource, format_err_chain(&e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(vault = vault_url, secret = name, "secret not found");
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| StratusError::transport("get_secret", &resource, format_err_chain(&e)))?;
        if !status.is_success() {
            return Err(StratusError::transport(
                "get_secret",
                &resource,
                format!("{status}: {body}"),
            ));
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| StratusError::transport("get_secret", &resource, e.to_string()))?;
        let secret = value
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                StratusError::transport("get_secret", &resource, "response has no value field")
            })?;
        Ok(Some(secret.to_string()))
    }
}
