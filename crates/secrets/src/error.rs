//! Error types for secret retrieval.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    /// The named secret does not exist in the store.
    #[error("secret '{0}' not found")]
    NotFound(String),

    /// The store refused access to the secret.
    #[error("access to secret '{name}' denied (http {status})")]
    Denied { name: String, status: u16 },

    /// Unexpected HTTP status from the store.
    #[error("secret store returned http {0}")]
    Http(u16),

    /// No credential could be obtained to talk to the store.
    #[error("credential unavailable: {0}")]
    Credential(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            SecretError::NotFound("azure-tenant-id".into()).to_string(),
            "secret 'azure-tenant-id' not found"
        );
        assert_eq!(
            SecretError::Denied {
                name: "azure-client-secret".into(),
                status: 403
            }
            .to_string(),
            "access to secret 'azure-client-secret' denied (http 403)"
        );
        assert_eq!(SecretError::Http(500).to_string(), "secret store returned http 500");
    }
}
