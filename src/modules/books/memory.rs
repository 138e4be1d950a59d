//! In-process storage backend for local runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{Book, BookPatch};
use super::store::BookRepository;

/// Records kept in insertion order.
#[derive(Default)]
pub struct MemoryBookRepository {
    books: RwLock<Vec<Book>>,
}

impl MemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut books: Vec<Book>) -> Vec<Book> {
    // Later inserts win ties on equal creation times
    books.reverse();
    books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    books
}

/// Whole-word, case-insensitive match of any query term, like a text index.
fn matches_terms(book: &Book, terms: &[String]) -> bool {
    [&book.title, &book.author, &book.genre, &book.publisher]
        .iter()
        .flat_map(|field| field.split(|c: char| !c.is_alphanumeric()))
        .any(|word| terms.iter().any(|term| word.to_lowercase() == *term))
}

#[async_trait]
impl BookRepository for MemoryBookRepository {
    fn next_id(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }

    async fn insert(&self, book: &Book) -> anyhow::Result<()> {
        let mut books = self.books.write().await;
        if books.iter().any(|b| b.object_id == book.object_id || b.id == book.id) {
            anyhow::bail!("duplicate key for book '{}'", book.id);
        }
        books.push(book.clone());
        Ok(())
    }

    async fn find(&self, object_id: &str) -> anyhow::Result<Option<Book>> {
        let books = self.books.read().await;
        Ok(books.iter().find(|b| b.object_id == object_id).cloned())
    }

    async fn list(&self) -> anyhow::Result<Vec<Book>> {
        Ok(newest_first(self.books.read().await.clone()))
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Book>> {
        let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
        let books = self.books.read().await;
        let hits = books
            .iter()
            .filter(|book| matches_terms(book, &terms))
            .cloned()
            .collect();
        Ok(newest_first(hits))
    }

    async fn update(
        &self,
        object_id: &str,
        patch: &BookPatch,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Book>> {
        let mut books = self.books.write().await;
        Ok(books
            .iter_mut()
            .find(|b| b.object_id == object_id)
            .map(|book| {
                book.apply(patch.clone(), now);
                book.clone()
            }))
    }

    async fn remove(&self, object_id: &str) -> anyhow::Result<Option<Book>> {
        let mut books = self.books.write().await;
        let position = books.iter().position(|b| b.object_id == object_id);
        Ok(position.map(|index| books.remove(index)))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
