//! Process-wide dependencies built once at startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use folio_authz::{DevTokenVerifier, IdentityVerifier, JwksVerifier, OAuthClient, VerifierConfig};
use folio_db::{AzureTableStore, ConnectionString, MemoryTableStore, TableStore};
use folio_kernel::settings::{Settings, StoreBackend};
use folio_secrets::{AppSecrets, SecretAccessor};

/// Shared state every module is built from.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn TableStore>,
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Present only when identity credentials were loaded.
    pub oauth: Option<Arc<OAuthClient>>,
}

impl AppContext {
    pub fn new(
        settings: Settings,
        store: Arc<dyn TableStore>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            verifier,
            oauth: None,
        }
    }

    pub fn with_oauth(mut self, oauth: OAuthClient) -> Self {
        self.oauth = Some(Arc::new(oauth));
        self
    }

    /// Load secrets and construct the store, verifier and OAuth client.
    pub async fn bootstrap(settings: Settings) -> anyhow::Result<Self> {
        let secrets = SecretAccessor::from_settings(&settings.secrets)?
            .load()
            .await
            .context("failed to load secrets")?;

        let store = build_store(&settings, &secrets)?;
        let verifier = build_verifier(&settings, &secrets)?;
        let oauth = match &secrets.identity {
            Some(identity) => Some(Arc::new(OAuthClient::new(
                &settings.identity,
                &identity.tenant_id,
                identity.client_id.clone(),
                identity.client_secret.expose(),
            )?)),
            None => None,
        };

        tracing::info!(
            store = store.kind(),
            oauth = oauth.is_some(),
            "application context ready"
        );

        Ok(Self {
            settings: Arc::new(settings),
            store,
            verifier,
            oauth,
        })
    }
}

fn build_store(settings: &Settings, secrets: &AppSecrets) -> anyhow::Result<Arc<dyn TableStore>> {
    match settings.store.backend {
        StoreBackend::Memory => {
            if !settings.environment.is_local() {
                tracing::warn!("memory store selected outside local; data will not persist");
            }
            Ok(Arc::new(MemoryTableStore::new()))
        }
        StoreBackend::AzureTable => {
            let raw = secrets
                .store_connection_string
                .as_ref()
                .context("azure_table backend selected but no store connection string was found")?;
            let connection = ConnectionString::parse(raw.expose())
                .context("store connection string is invalid")?;
            tracing::info!(
                account = connection.account_name(),
                table = %settings.store.table_name,
                "using azure table store"
            );
            let store = AzureTableStore::new(
                connection,
                settings.store.table_name.clone(),
                Duration::from_millis(settings.store.request_timeout_ms),
            )?;
            Ok(Arc::new(store))
        }
    }
}

fn build_verifier(
    settings: &Settings,
    secrets: &AppSecrets,
) -> anyhow::Result<Arc<dyn IdentityVerifier>> {
    let jwks: Option<Arc<dyn IdentityVerifier>> = match &secrets.identity {
        Some(identity) => {
            let config = VerifierConfig::for_tenant(
                &settings.identity,
                &identity.tenant_id,
                &identity.client_id,
            );
            Some(Arc::new(JwksVerifier::new(config)?))
        }
        None => None,
    };

    let dev_token = settings
        .identity
        .dev_token
        .as_deref()
        .filter(|token| !token.is_empty());

    match (dev_token, settings.environment.is_local()) {
        (Some(token), true) => {
            tracing::warn!("development token enabled");
            let dev = DevTokenVerifier::new(token);
            Ok(Arc::new(match jwks {
                Some(jwks) => dev.with_fallback(jwks),
                None => dev,
            }))
        }
        (Some(_), false) => {
            tracing::warn!(
                environment = ?settings.environment,
                "ignoring development token outside local"
            );
            jwks.context("identity credentials are required outside local")
        }
        (None, _) => match jwks {
            Some(jwks) => Ok(jwks),
            None => bail!(
                "no identity credentials found and no development token configured; \
                 set the tenant, client id and client secret"
            ),
        },
    }
}
