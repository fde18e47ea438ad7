//! Router builder for the Folio HTTP server

use std::time::Duration;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use uuid::{NoContext, Timestamp, Uuid};

use folio_kernel::ModuleRegistry;

use crate::error::AppError;

const API_TITLE: &str = "Folio Book API";

/// Path a module is served under: `{prefix}/{name}`.
pub fn mount_path(prefix: &str, module_name: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("/{}", module_name)
    } else {
        format!("/{}/{}", prefix, module_name)
    }
}

// The timeout layer answers with a bare 408; no handler produces one itself.
async fn timeout_envelope(response: Response) -> Response {
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return AppError::Timeout.into_response();
    }
    response
}

/// Assembles the service router: module mounts, middleware and API docs.
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn route(mut self, path: &str, route: axum::routing::MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router under `{prefix}/{module_name}`
    pub fn mount_module(mut self, prefix: &str, module_name: &str, module_router: Router) -> Self {
        self.router = self
            .router
            .nest(&mount_path(prefix, module_name), module_router);
        self
    }

    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(false))
                .on_request(DefaultOnRequest::new().level(tracing::Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// CORS for the given origins; an empty list allows any origin.
    pub fn with_cors(mut self, origins: &[String]) -> Self {
        let allow_origin = if origins.is_empty() {
            AllowOrigin::from(Any)
        } else {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        tracing::warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(origins)
        };

        self.router = self.router.layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        );
        self
    }

    /// Tag each request with `x-request-id` and echo it on the response.
    pub fn with_request_id(mut self) -> Self {
        let header = HeaderName::from_static("x-request-id");
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(SetRequestIdLayer::new(header, MakeRequestUuidV7));
        self
    }

    /// Abort handlers that run longer than `timeout_ms` with a 408 envelope.
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)))
            .layer(map_response(timeout_envelope));
        self
    }

    /// Serve one OpenAPI document merged from every module's fragment.
    ///
    /// Module paths are rewritten to where the module is mounted.
    pub fn with_openapi(mut self, registry: &ModuleRegistry, prefix: &str) -> Self {
        let document = merged_openapi(registry, prefix);

        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(document.clone())
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "merged OpenAPI document did not parse, serving stub");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title(API_TITLE)
                            .version(env!("CARGO_PKG_VERSION"))
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", openapi_obj),
        );
        self.router = self.router.route(
            "/docs/openapi.json",
            get(move || async move { axum::Json(document.clone()) }),
        );
        self
    }

    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn merged_openapi(registry: &ModuleRegistry, prefix: &str) -> Value {
    let mut document = json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Create, list, read, update and delete books"
        },
        "paths": {},
        "components": {
            "schemas": {},
            "securitySchemes": {
                "bearerAuth": {"type": "http", "scheme": "bearer", "bearerFormat": "JWT"}
            }
        }
    });

    document["components"]["schemas"]["ErrorResponse"] = json!({
        "type": "object",
        "properties": {
            "success": {"type": "boolean"},
            "error": {
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "message": {"type": "string"},
                    "details": {"type": "array", "items": {}},
                    "trace_id": {"type": "string"},
                    "timestamp": {"type": "string"}
                },
                "required": ["code", "message", "trace_id", "timestamp"]
            }
        },
        "required": ["success", "error"]
    });

    document["paths"]["/health"] = json!({
        "get": {
            "summary": "Liveness check",
            "responses": {"200": {"description": "Service is healthy"}}
        }
    });

    for module in registry.modules() {
        let Some(fragment) = module.openapi() else {
            continue;
        };
        let base = mount_path(prefix, module.name());

        if let Some(paths) = fragment.get("paths").and_then(Value::as_object) {
            for (path, item) in paths {
                let full = if path == "/" {
                    base.clone()
                } else {
                    format!("{}{}", base, path)
                };
                document["paths"][full] = item.clone();
            }
        }
        if let Some(schemas) = fragment
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
        {
            for (name, schema) in schemas {
                document["components"]["schemas"][name] = schema.clone();
            }
        }
    }

    document
}

#[derive(Clone)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v7(Timestamp::now(NoContext))
            .to_string()
            .parse::<HeaderValue>()
            .ok()?;
        Some(RequestId::new(id))
    }
}
