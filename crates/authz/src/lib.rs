//! Bearer token verification against the identity provider.
//!
//! [`JwksVerifier`] validates RS256 access tokens against the provider's
//! published signing keys. [`DevTokenVerifier`] accepts one static token for
//! local development and can fall back to a real verifier. [`OAuthClient`]
//! covers the authorization-code half of the sign-in flow.

mod dev;
mod error;
mod identity;
mod jwks;
mod oauth;

pub use dev::DevTokenVerifier;
pub use error::AuthError;
pub use identity::Identity;
pub use jwks::{JwksVerifier, VerifierConfig};
pub use oauth::{OAuthClient, TokenGrant};

use async_trait::async_trait;

/// Turns a bearer token into a verified [`Identity`].
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}
