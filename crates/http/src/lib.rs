//! HTTP server facade for Folio with Axum, error handling, and OpenAPI support.

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use folio_kernel::{settings::Settings, ModuleRegistry};

pub mod auth;
pub mod error;
pub mod router;

pub use auth::{protect, CurrentUser};
pub use error::AppError;

use router::RouterBuilder;

const SERVICE_NAME: &str = "Folio Book API";

/// Start the HTTP server and serve until ctrl-c or SIGTERM.
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let app = build_router(registry, settings);

    let address = settings.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {}", address))?;

    tracing::info!(%address, environment = ?settings.environment, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> Router {
    let prefix = settings.server.api_prefix.as_str();
    let mut builder = RouterBuilder::new()
        .route("/", get(service_info))
        .route("/health", get(health_check));

    for module in registry.modules() {
        tracing::info!(
            module = module.name(),
            path = %router::mount_path(prefix, module.name()),
            "mounting module routes"
        );
        builder = builder.mount_module(prefix, module.name(), module.routes());
    }

    builder
        .with_openapi(registry, prefix)
        .with_timeout(settings.server.request_timeout_ms)
        .with_cors(&settings.server.cors_origins)
        .with_tracing()
        .with_request_id()
        .build()
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "success": true,
        "name": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Create, list, read, update and delete books",
        "docs": "/swagger-ui",
        "openapi": "/docs/openapi.json",
        "health": "/health"
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "success": true,
        "message": "Book management API is running"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let request = axum::http::Request::builder()
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_reports_healthy() {
        let router = build_router(&ModuleRegistry::new(), &Settings::default());
        let (status, body) = get_json(router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["success"], true);
    }

    #[tokio::test]
    async fn root_describes_service() {
        let router = build_router(&ModuleRegistry::new(), &Settings::default());
        let (status, body) = get_json(router, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], SERVICE_NAME);
        assert_eq!(body["health"], "/health");
    }
}
