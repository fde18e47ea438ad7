//! Azure Key Vault secrets over REST, authenticated with a managed identity.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::error::SecretError;
use crate::store::{SecretStore, SecretValue};

/// Key Vault data-plane API version.
const API_VERSION: &str = "7.4";

/// Instance metadata token endpoint path.
const TOKEN_PATH: &str = "/metadata/identity/oauth2/token";

/// Instance metadata API version for managed identity tokens.
const TOKEN_API_VERSION: &str = "2018-02-01";

/// Resource the managed identity token is requested for.
const VAULT_RESOURCE: &str = "https://vault.azure.net";

const METADATA_HEADER: &str = "Metadata";
const METADATA_VALUE: &str = "true";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct SecretBundle {
    value: String,
}

/// Reads secrets from a Key Vault.
///
/// The access token is requested from the instance metadata endpoint on first
/// use and reused for the lifetime of the store, which only lives through
/// startup.
pub struct KeyVaultSecretStore {
    client: Client,
    vault_url: String,
    metadata_url: String,
    token: OnceCell<String>,
}

impl KeyVaultSecretStore {
    pub fn new(vault_url: &str, metadata_url: &str) -> Result<Self, SecretError> {
        let client = Client::builder().timeout(DEFAULT_TIMEOUT).build()?;
        Ok(Self {
            client,
            vault_url: vault_url.trim_end_matches('/').to_string(),
            metadata_url: metadata_url.trim_end_matches('/').to_string(),
            token: OnceCell::new(),
        })
    }

    async fn access_token(&self) -> Result<&str, SecretError> {
        let token = self.token.get_or_try_init(|| self.fetch_token()).await?;
        Ok(token.as_str())
    }

    async fn fetch_token(&self) -> Result<String, SecretError> {
        let url = format!("{}{}", self.metadata_url, TOKEN_PATH);
        let response = self
            .client
            .get(&url)
            .query(&[("api-version", TOKEN_API_VERSION), ("resource", VAULT_RESOURCE)])
            .header(METADATA_HEADER, METADATA_VALUE)
            .send()
            .await
            .map_err(|e| SecretError::Credential(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SecretError::Credential(format!(
                "managed identity endpoint returned http {}",
                response.status().as_u16()
            )));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!(target: "folio-secrets", "obtained managed identity token");
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    fn kind(&self) -> &'static str {
        "key_vault"
    }

    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        let token = self.access_token().await?;
        let url = format!("{}/secrets/{}", self.vault_url, name);

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let bundle: SecretBundle = response.json().await?;
                Ok(SecretValue::new(bundle.value))
            }
            StatusCode::NOT_FOUND => Err(SecretError::NotFound(name.to_string())),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(SecretError::Denied {
                    name: name.to_string(),
                    status: status.as_u16(),
                })
            }
            status => Err(SecretError::Http(status.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_token(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .and(header(METADATA_HEADER, METADATA_VALUE))
            .and(query_param("resource", VAULT_RESOURCE))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "mi-token"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetches_secret_with_managed_identity_token() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/secrets/cosmos-connection-string"))
            .and(query_param("api-version", API_VERSION))
            .and(header("authorization", "Bearer mi-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": "AccountName=acct;AccountKey=a2V5",
                "id": "https://vault/secrets/cosmos-connection-string/1"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/secrets/azure-tenant-id"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "tenant"})),
            )
            .mount(&server)
            .await;

        let store = KeyVaultSecretStore::new(&server.uri(), &server.uri()).unwrap();
        let conn = store.get_secret("cosmos-connection-string").await.unwrap();
        assert_eq!(conn.expose(), "AccountName=acct;AccountKey=a2V5");
        // Second secret reuses the cached token; `expect(1)` verifies on drop.
        let tenant = store.get_secret("azure-tenant-id").await.unwrap();
        assert_eq!(tenant.expose(), "tenant");
    }

    #[tokio::test]
    async fn maps_missing_and_forbidden_secrets() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("GET"))
            .and(path("/secrets/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/secrets/locked"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let store = KeyVaultSecretStore::new(&server.uri(), &server.uri()).unwrap();
        assert!(matches!(
            store.get_secret("missing").await,
            Err(SecretError::NotFound(name)) if name == "missing"
        ));
        assert!(matches!(
            store.get_secret("locked").await,
            Err(SecretError::Denied { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn token_failure_is_a_credential_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(TOKEN_PATH))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let store = KeyVaultSecretStore::new(&server.uri(), &server.uri()).unwrap();
        let err = store.get_secret("anything").await.unwrap_err();
        assert!(matches!(err, SecretError::Credential(_)));
    }
}
