//! Sign-in helpers: authorize URL, code exchange and the caller's identity.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use folio_authz::{AuthError, Identity, IdentityVerifier, OAuthClient, TokenGrant};
use folio_http::{AppError, CurrentUser};
use folio_kernel::Module;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::context::AppContext;

pub struct AuthModule {
    oauth: Option<Arc<OAuthClient>>,
    verifier: Arc<dyn IdentityVerifier>,
}

impl AuthModule {
    pub fn new(ctx: &AppContext) -> Self {
        Self {
            oauth: ctx.oauth.clone(),
            verifier: ctx.verifier.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthUrlQuery {
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub success: bool,
    #[serde(flatten)]
    pub grant: TokenGrant,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: Identity,
}

type OAuthState = Option<Arc<OAuthClient>>;

fn client(state: &OAuthState) -> Result<&OAuthClient, AppError> {
    state
        .as_deref()
        .ok_or_else(|| AppError::Internal(anyhow!("identity credentials are not configured")))
}

async fn auth_url(
    State(oauth): State<OAuthState>,
    Query(query): Query<AuthUrlQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let url = client(&oauth)?.authorization_url(query.state.as_deref())?;
    Ok(Json(json!({"success": true, "auth_url": url})))
}

async fn exchange_token(
    State(oauth): State<OAuthState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(request) = payload?;
    let code = request
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| {
            AppError::validation(vec![json!({"field": "code", "error": "required"})], "Validation failed")
        })?;

    let grant = client(&oauth)?
        .exchange_code(code)
        .await
        .map_err(|e| match e {
            AuthError::Exchange(_) => AppError::bad_request(e.public_message()),
            other => AppError::from(other),
        })?;
    Ok(Json(TokenResponse {
        success: true,
        grant,
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user,
    })
}

#[async_trait]
impl Module for AuthModule {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn routes(&self) -> Router {
        let public = Router::new()
            .route("/url", get(auth_url))
            .route("/token", post(exchange_token))
            .with_state(self.oauth.clone());
        let protected = folio_http::protect(Router::new().route("/me", get(me)), self.verifier.clone());
        public.merge(protected)
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        let error = json!({
            "description": "Error",
            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
        });
        Some(json!({
            "paths": {
                "/url": {
                    "get": {
                        "summary": "Authorization URL for the sign-in flow",
                        "tags": ["Auth"],
                        "responses": {"200": {"description": "URL to visit"}, "500": error}
                    }
                },
                "/token": {
                    "post": {
                        "summary": "Exchange an authorization code for tokens",
                        "tags": ["Auth"],
                        "responses": {"200": {"description": "Issued tokens"}, "400": error, "500": error}
                    }
                },
                "/me": {
                    "get": {
                        "summary": "Identity of the caller",
                        "tags": ["Auth"],
                        "security": [{"bearerAuth": []}],
                        "responses": {"200": {"description": "Verified identity"}, "401": error}
                    }
                }
            }
        }))
    }
}

pub fn create_module(ctx: &AppContext) -> Arc<dyn Module> {
    Arc::new(AuthModule::new(ctx))
}
