use chrono::{DateTime, Duration, SubsecRound, Utc};
use folio_db::{StoreError, TableRepository};
use folio_http::AppError;
use thiserror::Error;
use uuid::Uuid;

use super::models::{Book, BookFields, BookInput, FieldError};

/// Message for every lookup of a book that does not exist.
pub const BOOK_NOT_FOUND_MESSAGE: &str = "Book not found";

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book input")]
    Validation(Vec<FieldError>),

    #[error("{}", BOOK_NOT_FOUND_MESSAGE)]
    NotFound,

    #[error("book {0} already exists")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<BookError> for AppError {
    fn from(err: BookError) -> Self {
        match err {
            BookError::Validation(errors) => AppError::validation(
                errors
                    .iter()
                    .map(|e| serde_json::json!({"field": e.field, "error": e.error}))
                    .collect(),
                "Validation failed",
            ),
            BookError::NotFound => AppError::not_found(BOOK_NOT_FOUND_MESSAGE),
            BookError::Conflict(id) => {
                AppError::conflict(vec![serde_json::json!({"id": id})], "Book already exists")
            }
            BookError::Store(e) => {
                AppError::Internal(anyhow::Error::new(e).context("book store request failed"))
            }
        }
    }
}

/// CRUD over the books partition.
#[derive(Clone)]
pub struct BookService {
    repo: TableRepository<Book>,
}

impl BookService {
    pub fn new(repo: TableRepository<Book>) -> Self {
        Self { repo }
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        let mut books = self.repo.list().await?;
        books.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(books)
    }

    pub async fn create(&self, input: &BookInput) -> Result<Book, BookError> {
        let fields = input.validate().map_err(BookError::Validation)?;
        let now = now_micros();
        let book = Book {
            id: Uuid::now_v7().to_string(),
            partition: self.repo.partition().to_string(),
            title: fields.title,
            author: fields.author,
            description: fields.description,
            published_date: fields.published_date,
            created_at: now,
            updated_at: now,
        };

        self.repo.insert(&book).await.map_err(|e| match e {
            StoreError::Conflict { row_key, .. } => BookError::Conflict(row_key),
            other => BookError::Store(other),
        })?;
        tracing::info!(book_id = %book.id, "book created");
        Ok(book)
    }

    pub async fn get(&self, id: &str) -> Result<Book, BookError> {
        let id = parse_id(id)?;
        self.repo.get(&id).await?.ok_or(BookError::NotFound)
    }

    /// Replace every mutable field, keeping `id` and `created_at`.
    pub async fn update(&self, id: &str, input: &BookInput) -> Result<Book, BookError> {
        let fields = input.validate().map_err(BookError::Validation)?;
        let id = parse_id(id)?;
        let existing = self.repo.get(&id).await?.ok_or(BookError::NotFound)?;

        let book = apply(existing, fields, now_micros());
        // A delete may land between the read and the write.
        if !self.repo.replace(&book).await? {
            return Err(BookError::NotFound);
        }
        tracing::info!(book_id = %book.id, "book updated");
        Ok(book)
    }

    pub async fn delete(&self, id: &str) -> Result<String, BookError> {
        let id = parse_id(id)?;
        if !self.repo.delete(&id).await? {
            return Err(BookError::NotFound);
        }
        tracing::info!(book_id = %id, "book deleted");
        Ok(id)
    }
}

/// Only canonical UUIDs can be row keys; anything else cannot exist.
fn parse_id(raw: &str) -> Result<String, BookError> {
    Uuid::parse_str(raw.trim())
        .map(|id| id.to_string())
        .map_err(|_| BookError::NotFound)
}

fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn apply(existing: Book, fields: BookFields, now: DateTime<Utc>) -> Book {
    let floor = existing.updated_at + Duration::microseconds(1);
    Book {
        title: fields.title,
        author: fields.author,
        description: fields.description,
        published_date: fields.published_date,
        updated_at: now.max(floor),
        ..existing
    }
}
