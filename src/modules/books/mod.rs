pub mod models;
pub mod routes;
pub mod service;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use axum::Router;
use folio_authz::IdentityVerifier;
use folio_db::{TableRepository, TableStore};
use folio_kernel::{InitCtx, Module};
use serde_json::{json, Value};

use crate::context::AppContext;
use service::BookService;

pub use service::BOOK_NOT_FOUND_MESSAGE;

/// Authenticated CRUD over books.
pub struct BooksModule {
    store: Arc<dyn TableStore>,
    service: BookService,
    verifier: Arc<dyn IdentityVerifier>,
}

impl BooksModule {
    pub fn new(ctx: &AppContext) -> Self {
        let repo = TableRepository::new(ctx.store.clone(), ctx.settings.store.partition.clone());
        Self {
            store: ctx.store.clone(),
            service: BookService::new(repo),
            verifier: ctx.verifier.clone(),
        }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        self.store
            .ensure_table()
            .await
            .with_context(|| format!("failed to prepare table '{}'", ctx.settings.store.table_name))?;
        tracing::info!(
            module = self.name(),
            store = self.store.kind(),
            partition = %ctx.settings.store.partition,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        folio_http::protect(routes::router(self.service.clone()), self.verifier.clone())
    }

    fn openapi(&self) -> Option<Value> {
        Some(openapi())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/ErrorResponse"}}}
    })
}

fn book_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookResponse"}}}
    })
}

fn openapi() -> Value {
    json!({
        "paths": {
            "/": collection_path(),
            "/{id}": item_path()
        },
        "components": {"schemas": schemas()}
    })
}

fn collection_path() -> Value {
    let secured = json!([{"bearerAuth": []}]);
    json!({
        "get": {
            "summary": "List books",
            "tags": ["Books"],
            "security": secured,
            "responses": {
                "200": {
                    "description": "All books",
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookListResponse"}}}
                },
                "401": error_response("Missing or invalid token"),
                "500": error_response("Store unavailable")
            }
        },
        "post": {
            "summary": "Create a book",
            "tags": ["Books"],
            "security": secured,
            "requestBody": input_body(),
            "responses": {
                "201": book_response("Book created"),
                "400": error_response("Invalid input"),
                "401": error_response("Missing or invalid token"),
                "500": error_response("Store unavailable")
            }
        }
    })
}

fn item_path() -> Value {
    let secured = json!([{"bearerAuth": []}]);
    let id_param = json!([{
        "name": "id", "in": "path", "required": true,
        "schema": {"type": "string", "format": "uuid"}
    }]);
    json!({
        "get": {
            "summary": "Get a book",
            "tags": ["Books"],
            "security": secured,
            "parameters": id_param,
            "responses": {
                "200": book_response("The book"),
                "401": error_response("Missing or invalid token"),
                "404": error_response(BOOK_NOT_FOUND_MESSAGE),
                "500": error_response("Store unavailable")
            }
        },
        "put": {
            "summary": "Replace a book",
            "tags": ["Books"],
            "security": secured,
            "parameters": id_param,
            "requestBody": input_body(),
            "responses": {
                "200": book_response("Book updated"),
                "400": error_response("Invalid input"),
                "401": error_response("Missing or invalid token"),
                "404": error_response(BOOK_NOT_FOUND_MESSAGE),
                "500": error_response("Store unavailable")
            }
        },
        "delete": {
            "summary": "Delete a book",
            "tags": ["Books"],
            "security": secured,
            "parameters": id_param,
            "responses": {
                "200": {
                    "description": "Book deleted",
                    "content": {"application/json": {"schema": {"$ref": "#/components/schemas/DeleteResponse"}}}
                },
                "401": error_response("Missing or invalid token"),
                "404": error_response(BOOK_NOT_FOUND_MESSAGE),
                "500": error_response("Store unavailable")
            }
        }
    })
}

fn input_body() -> Value {
    json!({
        "required": true,
        "content": {"application/json": {"schema": {"$ref": "#/components/schemas/BookInput"}}}
    })
}

fn schemas() -> Value {
    json!({
        "Book": {
            "type": "object",
            "properties": {
                "id": {"type": "string", "format": "uuid"},
                "partition": {"type": "string"},
                "title": {"type": "string", "maxLength": models::MAX_NAME_CHARS},
                "author": {"type": "string", "maxLength": models::MAX_NAME_CHARS},
                "description": {"type": "string", "maxLength": models::MAX_DESCRIPTION_CHARS},
                "published_date": {"type": "string", "format": "date", "nullable": true},
                "created_at": {"type": "string", "format": "date-time"},
                "updated_at": {"type": "string", "format": "date-time"}
            },
            "required": ["id", "partition", "title", "author", "description", "created_at", "updated_at"]
        },
        "BookInput": {
            "type": "object",
            "properties": {
                "title": {"type": "string"},
                "author": {"type": "string"},
                "description": {"type": "string"},
                "published_date": {"type": "string", "format": "date"}
            },
            "required": ["title", "author"]
        },
        "BookResponse": {
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "message": {"type": "string"},
                "book": {"$ref": "#/components/schemas/Book"}
            },
            "required": ["success", "book"]
        },
        "BookListResponse": {
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "count": {"type": "integer"},
                "books": {"type": "array", "items": {"$ref": "#/components/schemas/Book"}}
            },
            "required": ["success", "count", "books"]
        },
        "DeleteResponse": {
            "type": "object",
            "properties": {
                "success": {"type": "boolean"},
                "message": {"type": "string"},
                "id": {"type": "string"}
            },
            "required": ["success", "message", "id"]
        }
    })
}

pub fn create_module(ctx: &AppContext) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(ctx))
}
