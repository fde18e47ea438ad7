use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "FOLIO_ENV";
const CONFIG_DIR_ENV: &str = "FOLIO_CONFIG_DIR";
const ENV_PREFIX: &str = "FOLIO";
const ENV_SEPARATOR: &str = "__";

/// Where the service is deployed. Gates the development token.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl Environment {
    pub fn is_local(self) -> bool {
        self == Environment::Local
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Service configuration, resolved once at startup.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub identity: IdentitySettings,
    #[serde(default)]
    pub secrets: SecretsSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

impl Settings {
    /// Resolve `.env`, `config/base.toml`, `config/{env}.toml` and `FOLIO__*` variables, later sources winning.
    pub fn load() -> anyhow::Result<Self> {
        // A missing `.env` is fine.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let parsed_env: Environment = environment.parse()?;

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .with_list_parse_key("identity.scopes")
                    .with_list_parse_key("identity.jwks_urls"),
            );

        let cfg = builder
            .build()
            .context("could not assemble configuration sources")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .context("configuration has invalid values")?;

        // The selected environment always wins over any `environment` key in files.
        settings.environment = parsed_env;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Path prefix every module is mounted under, e.g. `/api`.
    #[serde(default)]
    pub api_prefix: String,
    /// Allowed CORS origins; empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
            api_prefix: String::new(),
            cors_origins: Vec::new(),
        }
    }
}

/// Which table store implementation backs the record store adapter.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    AzureTable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "StoreSettings::default_table_name")]
    pub table_name: String,
    #[serde(default = "StoreSettings::default_partition")]
    pub partition: String,
    #[serde(default = "StoreSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl StoreSettings {
    fn default_table_name() -> String {
        "books".to_string()
    }

    fn default_partition() -> String {
        "books".to_string()
    }

    fn default_request_timeout_ms() -> u64 {
        10000
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            table_name: Self::default_table_name(),
            partition: Self::default_partition(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentitySettings {
    #[serde(default = "IdentitySettings::default_authority_host")]
    pub authority_host: String,
    #[serde(default = "IdentitySettings::default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "IdentitySettings::default_scopes")]
    pub scopes: Vec<String>,
    /// Explicit JWKS endpoints; when empty they are derived from the tenant.
    #[serde(default)]
    pub jwks_urls: Vec<String>,
    #[serde(default = "IdentitySettings::default_leeway_secs")]
    pub leeway_secs: u64,
    #[serde(default = "IdentitySettings::default_jwks_timeout_ms")]
    pub jwks_timeout_ms: u64,
    /// Minimum gap between key set refetches triggered by an unknown `kid`.
    #[serde(default = "IdentitySettings::default_jwks_refresh_cooldown_secs")]
    pub jwks_refresh_cooldown_secs: u64,
    /// Static token accepted as a demo identity. Only honoured in `local`.
    #[serde(default)]
    pub dev_token: Option<String>,
}

impl IdentitySettings {
    fn default_authority_host() -> String {
        "https://login.microsoftonline.com".to_string()
    }

    fn default_redirect_uri() -> String {
        "http://localhost:8501/callback".to_string()
    }

    fn default_scopes() -> Vec<String> {
        vec!["User.Read".to_string()]
    }

    fn default_leeway_secs() -> u64 {
        60
    }

    fn default_jwks_timeout_ms() -> u64 {
        10000
    }

    fn default_jwks_refresh_cooldown_secs() -> u64 {
        300
    }
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            authority_host: Self::default_authority_host(),
            redirect_uri: Self::default_redirect_uri(),
            scopes: Self::default_scopes(),
            jwks_urls: Vec::new(),
            leeway_secs: Self::default_leeway_secs(),
            jwks_timeout_ms: Self::default_jwks_timeout_ms(),
            jwks_refresh_cooldown_secs: Self::default_jwks_refresh_cooldown_secs(),
            dev_token: None,
        }
    }
}

/// Where named secrets are read from at startup.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecretProvider {
    #[default]
    Env,
    KeyVault,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretsSettings {
    #[serde(default)]
    pub provider: SecretProvider,
    #[serde(default = "SecretsSettings::default_vault_url")]
    pub vault_url: String,
    #[serde(default = "SecretsSettings::default_metadata_endpoint")]
    pub metadata_endpoint: String,
    /// Prefix prepended to environment variable names by the env provider.
    #[serde(default)]
    pub env_prefix: Option<String>,
    #[serde(default)]
    pub names: SecretNames,
}

impl SecretsSettings {
    fn default_vault_url() -> String {
        "https://bookmanagement-kv.vault.azure.net".to_string()
    }

    fn default_metadata_endpoint() -> String {
        "http://169.254.169.254".to_string()
    }
}

impl Default for SecretsSettings {
    fn default() -> Self {
        Self {
            provider: SecretProvider::default(),
            vault_url: Self::default_vault_url(),
            metadata_endpoint: Self::default_metadata_endpoint(),
            env_prefix: None,
            names: SecretNames::default(),
        }
    }
}

/// Secret names as stored in the vault.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretNames {
    #[serde(default = "SecretNames::default_store_connection_string")]
    pub store_connection_string: String,
    #[serde(default = "SecretNames::default_client_id")]
    pub client_id: String,
    #[serde(default = "SecretNames::default_client_secret")]
    pub client_secret: String,
    #[serde(default = "SecretNames::default_tenant_id")]
    pub tenant_id: String,
}

impl SecretNames {
    fn default_store_connection_string() -> String {
        "cosmos-connection-string".to_string()
    }

    fn default_client_id() -> String {
        "azure-client-id".to_string()
    }

    fn default_client_secret() -> String {
        "azure-client-secret".to_string()
    }

    fn default_tenant_id() -> String {
        "azure-tenant-id".to_string()
    }
}

impl Default for SecretNames {
    fn default() -> Self {
        Self {
            store_connection_string: Self::default_store_connection_string(),
            client_id: Self::default_client_id(),
            client_secret: Self::default_client_secret(),
            tenant_id: Self::default_tenant_id(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_filter")]
    pub log_filter: String,
}

impl TelemetrySettings {
    fn default_log_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: Self::default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
        assert!(settings.environment.is_local());
    }

    #[test]
    fn default_store_uses_books_partition_in_memory() {
        let settings = Settings::default();
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.store.table_name, "books");
        assert_eq!(settings.store.partition, "books");
    }

    #[test]
    fn default_secret_names_match_vault_layout() {
        let names = SecretNames::default();
        assert_eq!(names.store_connection_string, "cosmos-connection-string");
        assert_eq!(names.client_id, "azure-client-id");
        assert_eq!(names.client_secret, "azure-client-secret");
        assert_eq!(names.tenant_id, "azure-tenant-id");
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let err = "qa".parse::<Environment>().unwrap_err();
        assert!(err.to_string().contains("unsupported environment 'qa'"));
    }

    #[test]
    fn files_are_layered_by_environment() {
        let dir = std::env::temp_dir().join(format!("folio-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.toml"),
            "[server]\nport = 9100\n\n[store]\ntable_name = \"library\"\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("staging.toml"),
            "[server]\nport = 9200\n\n[store]\nbackend = \"azure_table\"\n",
        )
        .unwrap();

        let settings = Settings::load_from(&dir, "staging").unwrap();
        assert_eq!(settings.environment, Environment::Staging);
        assert_eq!(settings.server.port, 9200);
        assert_eq!(settings.store.table_name, "library");
        assert_eq!(settings.store.backend, StoreBackend::AzureTable);

        std::fs::remove_dir_all(&dir).ok();
    }
}
