//! Record store: the lifecycle rules for book records on top of a storage
//! backend.

use std::sync::Arc;

use async_trait::async_trait;
use bookshelf_http::error::AppError;
use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::{Book, BookInput, BookPatch, FieldViolation};

/// Storage backend for book records.
///
/// Implementations report infrastructure failures as `anyhow` errors; absent
/// records are `None`/`false`, never errors.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Allocate the opaque identifier of a record about to be inserted.
    fn next_id(&self) -> String;

    async fn insert(&self, book: &Book) -> anyhow::Result<()>;

    async fn find(&self, object_id: &str) -> anyhow::Result<Option<Book>>;

    /// All records, newest first by creation time.
    async fn list(&self) -> anyhow::Result<Vec<Book>>;

    /// Keyword search over title, author, genre and publisher, newest first.
    async fn search(&self, query: &str) -> anyhow::Result<Vec<Book>>;

    /// Apply `patch` to a stored record in a single write and return the
    /// result. `updated_at` becomes `now`, or one millisecond past its previous
    /// value when the clock has not moved that far. `None` when absent.
    async fn update(
        &self,
        object_id: &str,
        patch: &BookPatch,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Book>>;

    async fn remove(&self, object_id: &str) -> anyhow::Result<Option<Book>>;

    async fn ping(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Error)]
pub enum BookError {
    #[error("invalid book input: {}", describe(.0))]
    Validation(Vec<FieldViolation>),

    #[error("book '{0}' not found")]
    NotFound(String),

    #[error("storage unavailable: {0:#}")]
    Storage(#[source] anyhow::Error),
}

fn describe(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.error))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<BookError> for AppError {
    fn from(error: BookError) -> Self {
        match error {
            BookError::Validation(violations) => {
                let message = describe(&violations);
                let details = violations
                    .iter()
                    .map(|v| serde_json::json!({ "field": v.field, "error": v.error }))
                    .collect();
                AppError::validation(details, message)
            }
            BookError::NotFound(id) => AppError::not_found(format!("book '{}' not found", id)),
            BookError::Storage(source) => {
                tracing::error!(error = %format!("{:#}", source), "book storage failure");
                AppError::unavailable("storage is unavailable, please retry")
            }
        }
    }
}

/// Book record operations shared by every transport.
#[derive(Clone)]
pub struct BookStore {
    repository: Arc<dyn BookRepository>,
}

impl BookStore {
    pub fn new(repository: Arc<dyn BookRepository>) -> Self {
        Self { repository }
    }

    pub async fn create(&self, input: BookInput) -> Result<Book, BookError> {
        let draft = input.into_draft().map_err(BookError::Validation)?;
        let book = Book::new(self.repository.next_id(), draft, Utc::now());

        self.repository
            .insert(&book)
            .await
            .map_err(BookError::Storage)?;

        tracing::info!(book_id = %book.id, title = %book.title, "book created");
        Ok(book)
    }

    pub async fn get(&self, object_id: &str) -> Result<Book, BookError> {
        self.repository
            .find(object_id)
            .await
            .map_err(BookError::Storage)?
            .ok_or_else(|| BookError::NotFound(object_id.to_string()))
    }

    pub async fn list(&self) -> Result<Vec<Book>, BookError> {
        self.repository.list().await.map_err(BookError::Storage)
    }

    /// Blank queries list everything.
    pub async fn search(&self, query: &str) -> Result<Vec<Book>, BookError> {
        let query = query.trim();
        if query.is_empty() {
            return self.list().await;
        }
        self.repository
            .search(query)
            .await
            .map_err(BookError::Storage)
    }

    /// Input is validated before the record is looked up, so a bad patch
    /// for an unknown id reports the validation failure.
    pub async fn update(&self, object_id: &str, input: BookInput) -> Result<Book, BookError> {
        let patch = input.into_patch().map_err(BookError::Validation)?;
        let book = self
            .repository
            .update(object_id, &patch, Utc::now())
            .await
            .map_err(BookError::Storage)?
            .ok_or_else(|| BookError::NotFound(object_id.to_string()))?;

        tracing::info!(book_id = %book.id, "book updated");
        Ok(book)
    }

    pub async fn delete(&self, object_id: &str) -> Result<Book, BookError> {
        let removed = self
            .repository
            .remove(object_id)
            .await
            .map_err(BookError::Storage)?
            .ok_or_else(|| BookError::NotFound(object_id.to_string()))?;

        tracing::info!(book_id = %removed.id, "book deleted");
        Ok(removed)
    }

    pub async fn ping(&self) -> Result<(), BookError> {
        self.repository.ping().await.map_err(BookError::Storage)
    }
}
