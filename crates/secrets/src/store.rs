use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::SecretError;

/// A secret value that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the plaintext. Callers must not log the result.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(**redacted**)")
    }
}

/// Source of named secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Short label for logs.
    fn kind(&self) -> &'static str;

    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError>;
}

/// Reads secrets from environment variables.
///
/// `cosmos-connection-string` maps to `COSMOS_CONNECTION_STRING`, or
/// `{PREFIX}_COSMOS_CONNECTION_STRING` when a prefix is configured. Empty
/// variables count as missing.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore {
    prefix: Option<String>,
}

impl EnvSecretStore {
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    pub fn variable_name(&self, secret: &str) -> String {
        let base: String = secret
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix.to_ascii_uppercase(), base),
            None => base,
        }
    }
}

#[async_trait]
impl SecretStore for EnvSecretStore {
    fn kind(&self) -> &'static str {
        "env"
    }

    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        match std::env::var(self.variable_name(name)) {
            Ok(value) if !value.trim().is_empty() => Ok(SecretValue::new(value)),
            _ => Err(SecretError::NotFound(name.to_string())),
        }
    }
}

/// Fixed in-process secrets, for tests and local wiring.
#[derive(Debug, Clone, Default)]
pub struct MemorySecretStore {
    secrets: HashMap<String, SecretValue>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), SecretValue::new(value));
        self
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get_secret(&self, name: &str) -> Result<SecretValue, SecretError> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecretError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_value_debug_is_redacted() {
        let value = SecretValue::new("AccountKey=hunter2");
        let printed = format!("{:?}", value);
        assert!(!printed.contains("hunter2"));
        assert_eq!(value.expose(), "AccountKey=hunter2");
    }

    #[test]
    fn env_variable_names_are_derived_from_secret_names() {
        let plain = EnvSecretStore::new(None);
        assert_eq!(
            plain.variable_name("cosmos-connection-string"),
            "COSMOS_CONNECTION_STRING"
        );

        let prefixed = EnvSecretStore::new(Some("folio".to_string()));
        assert_eq!(prefixed.variable_name("azure-tenant-id"), "FOLIO_AZURE_TENANT_ID");
    }

    #[tokio::test]
    async fn env_store_reads_and_treats_blank_as_missing() {
        let store = EnvSecretStore::new(Some("FOLIO_SECRETS_TEST".to_string()));
        std::env::set_var("FOLIO_SECRETS_TEST_PRESENT_SECRET", "value-1");
        std::env::set_var("FOLIO_SECRETS_TEST_BLANK_SECRET", "  ");

        let value = store.get_secret("present-secret").await.unwrap();
        assert_eq!(value.expose(), "value-1");

        let blank = store.get_secret("blank-secret").await.unwrap_err();
        assert!(matches!(blank, SecretError::NotFound(name) if name == "blank-secret"));

        let missing = store.get_secret("absent-secret").await.unwrap_err();
        assert!(matches!(missing, SecretError::NotFound(_)));
    }

    #[tokio::test]
    async fn memory_store_returns_configured_values() {
        let store = MemorySecretStore::new().with_secret("azure-client-id", "client-123");
        assert_eq!(
            store.get_secret("azure-client-id").await.unwrap().expose(),
            "client-123"
        );
        assert!(store.get_secret("azure-client-secret").await.is_err());
    }
}
