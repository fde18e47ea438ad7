use std::sync::Arc;

use async_trait::async_trait;
use subtle::ConstantTimeEq;

use crate::error::AuthError;
use crate::identity::Identity;
use crate::IdentityVerifier;

/// Accepts one static token as the demo identity.
///
/// Any other token goes to `fallback` when one is configured and is rejected
/// otherwise. Only wire this up for local environments.
pub struct DevTokenVerifier {
    token: String,
    identity: Identity,
    fallback: Option<Arc<dyn IdentityVerifier>>,
}

impl DevTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            identity: Identity::demo(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn IdentityVerifier>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn matches(&self, token: &str) -> bool {
        !self.token.is_empty() && bool::from(self.token.as_bytes().ct_eq(token.as_bytes()))
    }
}

#[async_trait]
impl IdentityVerifier for DevTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if self.matches(token) {
            tracing::debug!("accepted development token");
            return Ok(self.identity.clone());
        }
        match &self.fallback {
            Some(fallback) => fallback.verify(token).await,
            None => Err(AuthError::Invalid("unrecognized token".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reject;

    #[async_trait]
    impl IdentityVerifier for Reject {
        async fn verify(&self, _token: &str) -> Result<Identity, AuthError> {
            Err(AuthError::Expired)
        }
    }

    #[tokio::test]
    async fn accepts_only_the_configured_token() {
        let verifier = DevTokenVerifier::new("demo-token");
        let identity = verifier.verify("demo-token").await.unwrap();
        assert_eq!(identity.name, "Demo User");

        assert!(verifier.verify("demo-token2").await.is_err());
        assert!(verifier.verify("").await.is_err());
    }

    #[tokio::test]
    async fn empty_token_never_matches() {
        let verifier = DevTokenVerifier::new("");
        assert!(verifier.verify("").await.is_err());
    }

    #[tokio::test]
    async fn other_tokens_reach_fallback() {
        let verifier = DevTokenVerifier::new("demo-token").with_fallback(Arc::new(Reject));
        let err = verifier.verify("real.jwt.token").await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }
}
