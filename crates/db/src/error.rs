//! Error types for table store operations.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Insert of a key that already exists.
    #[error("entity {partition}/{row_key} already exists")]
    Conflict { partition: String, row_key: String },

    /// The store asked us to back off.
    #[error("store throttled the request (http {0})")]
    Throttled(u16),

    /// The store could not be reached or is switched off.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Unexpected HTTP status, with the service error code when one was sent.
    #[error("store returned http {status}{}", code.as_deref().map(|c| format!(" ({c})")).unwrap_or_default())]
    Http { status: u16, code: Option<String> },

    /// A stored entity could not be mapped onto the record type.
    #[error("malformed entity '{row_key}': {reason}")]
    Malformed { row_key: String, reason: String },

    #[error("invalid connection string: {0}")]
    ConnectionString(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn malformed(row_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            row_key: row_key.into(),
            reason: reason.into(),
        }
    }
}
