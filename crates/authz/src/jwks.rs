use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use folio_kernel::settings::IdentitySettings;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::AuthError;
use crate::identity::Identity;
use crate::IdentityVerifier;

const LEGACY_ISSUER_HOST: &str = "https://sts.windows.net";

/// What a token must satisfy to be accepted.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Key set endpoints, tried in order until one answers.
    pub jwks_urls: Vec<String>,
    pub issuers: Vec<String>,
    pub audiences: Vec<String>,
    pub leeway_secs: u64,
    pub timeout: Duration,
    /// An unknown `kid` refetches the key set at most once per this window.
    pub refresh_cooldown: Duration,
}

impl VerifierConfig {
    /// Configuration for tokens issued by `tenant` to the application `client_id`.
    ///
    /// Both the v2 issuer and the legacy `sts.windows.net` issuer are
    /// accepted, as are the bare client id and its `api://` form as audience.
    pub fn for_tenant(settings: &IdentitySettings, tenant: &str, client_id: &str) -> Self {
        let host = settings.authority_host.trim_end_matches('/');
        let jwks_urls = if settings.jwks_urls.is_empty() {
            vec![
                format!("{host}/{tenant}/discovery/v2.0/keys"),
                format!("{host}/common/discovery/v2.0/keys"),
            ]
        } else {
            settings.jwks_urls.clone()
        };

        Self {
            jwks_urls,
            issuers: vec![
                format!("{host}/{tenant}/v2.0"),
                format!("{LEGACY_ISSUER_HOST}/{tenant}/"),
            ],
            audiences: vec![client_id.to_string(), format!("api://{client_id}")],
            leeway_secs: settings.leeway_secs,
            timeout: Duration::from_millis(settings.jwks_timeout_ms),
            refresh_cooldown: Duration::from_secs(settings.jwks_refresh_cooldown_secs),
        }
    }
}

#[derive(Default)]
struct KeyCache {
    keys: Option<Arc<JwkSet>>,
    /// Last refetch caused by an unknown `kid`. The initial fill does not count.
    refreshed_at: Option<Instant>,
}

impl KeyCache {
    /// Cached keys that can serve `kid` without a fetch.
    ///
    /// A miss is served from the cache too while the last refetch is younger
    /// than `cooldown`; the caller then rejects the token as an unknown key.
    fn usable(&self, kid: &str, cooldown: Duration) -> Option<Arc<JwkSet>> {
        let keys = self.keys.as_ref()?;
        let cooling = self.refreshed_at.is_some_and(|at| at.elapsed() < cooldown);
        (keys.find(kid).is_some() || cooling).then(|| Arc::clone(keys))
    }
}

/// Verifies RS256 tokens against the provider's published key set.
///
/// The key set is fetched on first use and cached. A token signed with a key
/// id the cache does not know triggers a refetch, which picks up rotated keys.
/// Refetches are rate limited by `refresh_cooldown` and concurrent misses
/// share a single fetch.
pub struct JwksVerifier {
    client: reqwest::Client,
    config: VerifierConfig,
    cache: RwLock<KeyCache>,
}

impl JwksVerifier {
    pub fn new(config: VerifierConfig) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            config,
            cache: RwLock::new(KeyCache::default()),
        })
    }

    /// Key set to check a token with key id `kid` against.
    async fn keys_for(&self, kid: &str) -> Result<Arc<JwkSet>, AuthError> {
        let cooldown = self.config.refresh_cooldown;
        if let Some(keys) = self.cache.read().await.usable(kid, cooldown) {
            return Ok(keys);
        }

        // Held across the fetch so concurrent misses wait for one request.
        let mut cache = self.cache.write().await;
        if let Some(keys) = cache.usable(kid, cooldown) {
            return Ok(keys);
        }

        if cache.keys.is_some() {
            tracing::info!(%kid, "unknown signing key, refreshing key set");
            // Stamped before fetching so a failing provider is not retried per request.
            cache.refreshed_at = Some(Instant::now());
        }
        let keys = Arc::new(self.fetch_keys().await?);
        cache.keys = Some(Arc::clone(&keys));
        Ok(keys)
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        let mut last_error = String::from("no key set endpoints configured");
        for url in &self.config.jwks_urls {
            match self.fetch_from(url).await {
                Ok(keys) => {
                    tracing::debug!(%url, keys = keys.keys.len(), "fetched signing keys");
                    return Ok(keys);
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "signing key fetch failed");
                    last_error = e.to_string();
                }
            }
        }
        Err(AuthError::ProviderUnavailable(last_error))
    }

    async fn fetch_from(&self, url: &str) -> Result<JwkSet, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<JwkSet>()
            .await
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(self.config.audiences.as_slice());
        validation.set_issuer(self.config.issuers.as_slice());
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = self.config.leeway_secs;
        validation
    }
}

#[async_trait]
impl IdentityVerifier for JwksVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Invalid(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }
        let kid = header.kid.ok_or(AuthError::UnknownKey(None))?;

        let keys = self.keys_for(&kid).await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| AuthError::UnknownKey(Some(kid.clone())))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::Invalid(e.to_string()))?;

        let data = decode::<Map<String, Value>>(token, &key, &self.validation())?;
        Ok(Identity::from_claims(data.claims))
    }
}
