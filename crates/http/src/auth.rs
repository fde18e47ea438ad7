//! Bearer authentication for protected routes.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::{self, Next},
    response::Response,
    Router,
};
use folio_authz::{AuthError, Identity, IdentityVerifier};

use crate::error::AppError;

/// Require a verified bearer token on every route of `router`.
///
/// Applied as a route layer, so unmatched paths still 404 without a token.
pub fn protect(router: Router, verifier: Arc<dyn IdentityVerifier>) -> Router {
    router.route_layer(middleware::from_fn_with_state(verifier, require_bearer))
}

/// Verify the `Authorization: Bearer` header and stash the [`Identity`] in
/// the request extensions. Rejected requests never reach the handler.
pub async fn require_bearer(
    State(verifier): State<Arc<dyn IdentityVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers().get(header::AUTHORIZATION))?;
    let identity = verifier.verify(token).await?;
    tracing::debug!(subject = %identity.subject, "authenticated request");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn bearer_token(value: Option<&header::HeaderValue>) -> Result<&str, AuthError> {
    let value = value.ok_or(AuthError::MissingToken)?;
    let value = value
        .to_str()
        .map_err(|_| AuthError::Malformed("authorization header is not ASCII".to_string()))?;
    let (scheme, token) = value
        .split_once(' ')
        .ok_or_else(|| AuthError::Malformed("expected 'Bearer <token>'".to_string()))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::Malformed(format!("unsupported scheme {scheme}")));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// The caller identity established by [`require_bearer`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Identity);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::from(AuthError::MissingToken))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct OnlyGood;

    #[async_trait]
    impl IdentityVerifier for OnlyGood {
        async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
            match token {
                "good" => Ok(Identity::demo()),
                "down" => Err(AuthError::ProviderUnavailable("timeout".into())),
                _ => Err(AuthError::InvalidSignature),
            }
        }
    }

    fn app() -> Router {
        let router = Router::new().route(
            "/me",
            get(|CurrentUser(user): CurrentUser| async move { user.name }),
        );
        protect(router, Arc::new(OnlyGood))
    }

    fn request(auth: Option<&str>) -> axum::http::Request<Body> {
        let mut builder = axum::http::Request::builder().uri("/me");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn parses_bearer_header() {
        let value = HeaderValue::from_static("bearer abc.def");
        assert_eq!(bearer_token(Some(&value)).unwrap(), "abc.def");
        assert!(matches!(bearer_token(None), Err(AuthError::MissingToken)));

        let basic = HeaderValue::from_static("Basic dXNlcjpwYXNz");
        assert!(matches!(bearer_token(Some(&basic)), Err(AuthError::Malformed(_))));

        let empty = HeaderValue::from_static("Bearer  ");
        assert!(matches!(bearer_token(Some(&empty)), Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn passes_identity_to_handler() {
        let response = app().oneshot(request(Some("Bearer good"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Demo User");
    }

    #[tokio::test]
    async fn rejects_missing_and_bad_tokens() {
        let response = app().oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let response = app().oneshot(request(Some("Bearer forged"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn provider_outage_is_a_server_error() {
        let response = app().oneshot(request(Some("Bearer down"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
