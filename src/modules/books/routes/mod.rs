//! HTTP handlers for `/books`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use folio_http::{AppError, CurrentUser};

use super::models::{BookInput, BookListResponse, BookResponse, DeleteResponse};
use super::service::BookService;

pub fn router(service: BookService) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .with_state(service)
}

fn body(payload: Result<Json<BookInput>, JsonRejection>) -> Result<BookInput, AppError> {
    let Json(input) = payload?;
    Ok(input)
}

async fn list_books(
    State(service): State<BookService>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<BookListResponse>, AppError> {
    let books = service.list().await?;
    tracing::debug!(user = %user.subject, count = books.len(), "listed books");
    Ok(Json(BookListResponse {
        success: true,
        count: books.len(),
        books,
    }))
}

async fn create_book(
    State(service): State<BookService>,
    CurrentUser(user): CurrentUser,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<(StatusCode, Json<BookResponse>), AppError> {
    let input = body(payload)?;
    let book = service.create(&input).await?;
    tracing::info!(user = %user.subject, book_id = %book.id, "create request served");
    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            success: true,
            message: Some("Book created successfully".to_string()),
            book,
        }),
    ))
}

async fn get_book(
    State(service): State<BookService>,
    Path(id): Path<String>,
) -> Result<Json<BookResponse>, AppError> {
    let book = service.get(&id).await?;
    Ok(Json(BookResponse {
        success: true,
        message: None,
        book,
    }))
}

async fn update_book(
    State(service): State<BookService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> Result<Json<BookResponse>, AppError> {
    let input = body(payload)?;
    let book = service.update(&id, &input).await?;
    tracing::info!(user = %user.subject, book_id = %book.id, "update request served");
    Ok(Json(BookResponse {
        success: true,
        message: Some("Book updated successfully".to_string()),
        book,
    }))
}

async fn delete_book(
    State(service): State<BookService>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = service.delete(&id).await?;
    tracing::info!(user = %user.subject, book_id = %id, "delete request served");
    Ok(Json(DeleteResponse {
        success: true,
        message: "Book deleted successfully".to_string(),
        id,
    }))
}
