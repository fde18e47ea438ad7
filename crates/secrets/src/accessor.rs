use std::sync::Arc;

use anyhow::{bail, Context};
use folio_kernel::settings::{SecretNames, SecretProvider, SecretsSettings};

use crate::error::SecretError;
use crate::key_vault::KeyVaultSecretStore;
use crate::store::{EnvSecretStore, SecretStore, SecretValue};

/// Identity provider application credentials.
#[derive(Debug, Clone)]
pub struct IdentityCredentials {
    pub client_id: String,
    pub client_secret: SecretValue,
    pub tenant_id: String,
}

/// Secrets the service needs, fetched once at startup.
#[derive(Debug, Clone, Default)]
pub struct AppSecrets {
    pub store_connection_string: Option<SecretValue>,
    pub identity: Option<IdentityCredentials>,
}

/// Fetches the configured secret names from a [`SecretStore`].
pub struct SecretAccessor {
    store: Arc<dyn SecretStore>,
    names: SecretNames,
}

impl SecretAccessor {
    pub fn new(store: Arc<dyn SecretStore>, names: SecretNames) -> Self {
        Self { store, names }
    }

    /// Build the accessor for the configured provider.
    pub fn from_settings(settings: &SecretsSettings) -> anyhow::Result<Self> {
        let store: Arc<dyn SecretStore> = match settings.provider {
            SecretProvider::Env => Arc::new(EnvSecretStore::new(settings.env_prefix.clone())),
            SecretProvider::KeyVault => Arc::new(
                KeyVaultSecretStore::new(&settings.vault_url, &settings.metadata_endpoint)
                    .context("failed to build key vault client")?,
            ),
        };
        Ok(Self::new(store, settings.names.clone()))
    }

    /// Fetch every named secret. Missing secrets become `None`; any other
    /// failure aborts, since the service cannot start half-configured.
    pub async fn load(&self) -> anyhow::Result<AppSecrets> {
        tracing::info!(
            target: "folio-secrets",
            provider = self.store.kind(),
            "loading secrets"
        );

        let store_connection_string = self.optional(&self.names.store_connection_string).await?;
        let client_id = self.optional(&self.names.client_id).await?;
        let client_secret = self.optional(&self.names.client_secret).await?;
        let tenant_id = self.optional(&self.names.tenant_id).await?;

        let identity = match (client_id, client_secret, tenant_id) {
            (Some(client_id), Some(client_secret), Some(tenant_id)) => Some(IdentityCredentials {
                client_id: client_id.expose().to_string(),
                client_secret,
                tenant_id: tenant_id.expose().to_string(),
            }),
            (None, None, None) => None,
            (client_id, client_secret, tenant_id) => {
                let missing: Vec<&str> = [
                    (client_id.is_none(), self.names.client_id.as_str()),
                    (client_secret.is_none(), self.names.client_secret.as_str()),
                    (tenant_id.is_none(), self.names.tenant_id.as_str()),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                bail!(
                    "incomplete identity provider credentials; missing: {}",
                    missing.join(", ")
                );
            }
        };

        tracing::info!(
            target: "folio-secrets",
            store_connection_string = store_connection_string.is_some(),
            identity = identity.is_some(),
            "secrets loaded"
        );

        Ok(AppSecrets {
            store_connection_string,
            identity,
        })
    }

    async fn optional(&self, name: &str) -> anyhow::Result<Option<SecretValue>> {
        match self.store.get_secret(name).await {
            Ok(value) => Ok(Some(value)),
            Err(SecretError::NotFound(_)) => {
                tracing::debug!(target: "folio-secrets", secret = name, "secret not present");
                Ok(None)
            }
            Err(e) => Err(e).with_context(|| format!("failed to read secret '{}'", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySecretStore;

    fn accessor(store: MemorySecretStore) -> SecretAccessor {
        SecretAccessor::new(Arc::new(store), SecretNames::default())
    }

    #[tokio::test]
    async fn loads_full_secret_set() {
        let store = MemorySecretStore::new()
            .with_secret("cosmos-connection-string", "AccountName=a;AccountKey=b")
            .with_secret("azure-client-id", "client")
            .with_secret("azure-client-secret", "s3cret")
            .with_secret("azure-tenant-id", "tenant");

        let secrets = accessor(store).load().await.unwrap();
        assert_eq!(
            secrets.store_connection_string.unwrap().expose(),
            "AccountName=a;AccountKey=b"
        );
        let identity = secrets.identity.unwrap();
        assert_eq!(identity.client_id, "client");
        assert_eq!(identity.tenant_id, "tenant");
        assert_eq!(identity.client_secret.expose(), "s3cret");
    }

    #[tokio::test]
    async fn absent_secrets_are_none() {
        let secrets = accessor(MemorySecretStore::new()).load().await.unwrap();
        assert!(secrets.store_connection_string.is_none());
        assert!(secrets.identity.is_none());
    }

    #[tokio::test]
    async fn partial_identity_credentials_fail() {
        let store = MemorySecretStore::new().with_secret("azure-client-id", "client");
        let err = accessor(store).load().await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("azure-client-secret"));
        assert!(message.contains("azure-tenant-id"));
        assert!(!message.contains("azure-client-id,"));
    }
}
