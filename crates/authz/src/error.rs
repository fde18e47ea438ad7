//! Rejection reasons for bearer tokens.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("invalid token issuer")]
    InvalidIssuer,

    #[error("invalid token audience")]
    InvalidAudience,

    #[error("no signing key matches kid {0:?}")]
    UnknownKey(Option<String>),

    #[error("token rejected: {0}")]
    Invalid(String),

    /// The identity provider could not be reached or answered garbage.
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The provider refused an authorization code.
    #[error("code exchange rejected: {0}")]
    Exchange(String),
}

impl AuthError {
    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "Missing bearer token",
            AuthError::Malformed(_) => "Invalid token format",
            AuthError::Expired => "Token has expired",
            AuthError::InvalidSignature | AuthError::UnknownKey(_) => "Invalid token signature",
            AuthError::InvalidIssuer => "Invalid token issuer",
            AuthError::InvalidAudience => "Invalid token audience",
            AuthError::Invalid(_) => "Token validation failed",
            AuthError::ProviderUnavailable(_) => "Unable to validate token",
            AuthError::Exchange(_) => "Failed to exchange code for token",
        }
    }

    /// Whether the failure lies with the provider rather than the caller.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, AuthError::ProviderUnavailable(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
            ErrorKind::InvalidAudience => AuthError::InvalidAudience,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::Malformed(err.to_string())
            }
            _ => AuthError::Invalid(err.to_string()),
        }
    }
}
