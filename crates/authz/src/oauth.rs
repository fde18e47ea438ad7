//! Authorization-code flow against the identity provider.

use std::time::Duration;

use folio_kernel::settings::IdentitySettings;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Tokens issued for an authorization code.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "TokenGrant::default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    fn default_token_type() -> String {
        "Bearer".to_string()
    }
}

#[derive(Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Confidential client for the provider's v2 endpoints.
pub struct OAuthClient {
    client: reqwest::Client,
    authorize_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub fn new(
        settings: &IdentitySettings,
        tenant: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let host = settings.authority_host.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.jwks_timeout_ms))
            .build()
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            authorize_url: format!("{host}/{tenant}/oauth2/v2.0/authorize"),
            token_url: format!("{host}/{tenant}/oauth2/v2.0/token"),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: settings.redirect_uri.clone(),
            scopes: settings.scopes.clone(),
        })
    }

    fn scope(&self) -> String {
        self.scopes.join(" ")
    }

    /// URL the user visits to sign in. `state` is echoed back on the redirect.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String, AuthError> {
        let scope = self.scope();
        let mut params = vec![
            ("client_id", self.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", scope.as_str()),
        ];
        if let Some(state) = state {
            params.push(("state", state));
        }
        let url = Url::parse_with_params(&self.authorize_url, &params)
            .map_err(|e| AuthError::Invalid(format!("authority url: {e}")))?;
        Ok(url.into())
    }

    /// Redeem an authorization code at the token endpoint.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenGrant, AuthError> {
        let scope = self.scope();
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let grant = response
                .json::<TokenGrant>()
                .await
                .map_err(|e| AuthError::ProviderUnavailable(e.to_string()))?;
            tracing::info!("exchanged authorization code for token");
            return Ok(grant);
        }

        if status.is_client_error() {
            let reason = match response.json::<TokenErrorBody>().await {
                Ok(body) => body.error_description.unwrap_or(body.error),
                Err(_) => format!("status {}", status.as_u16()),
            };
            tracing::warn!(status = status.as_u16(), %reason, "code exchange rejected");
            return Err(AuthError::Exchange(reason));
        }

        Err(AuthError::ProviderUnavailable(format!(
            "token endpoint returned {}",
            status.as_u16()
        )))
    }
}
