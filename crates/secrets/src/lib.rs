//! Named secret retrieval.
//!
//! Secrets are fetched once at process start through a [`SecretStore`] and
//! collected into an immutable [`AppSecrets`] that the rest of the service is
//! built from. Nothing here caches beyond that single fetch or rotates values.

mod accessor;
mod error;
mod key_vault;
mod store;

pub use accessor::{AppSecrets, IdentityCredentials, SecretAccessor};
pub use error::SecretError;
pub use key_vault::KeyVaultSecretStore;
pub use store::{EnvSecretStore, MemorySecretStore, SecretStore, SecretValue};
