//! MongoDB storage backend.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use serde::{Deserialize, Serialize};

use super::models::{truncate_millis, Book, BookPatch};
use super::store::BookRepository;

pub const COLLECTION: &str = "books";

/// Stored shape of a book record.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BookDocument {
    #[serde(rename = "_id")]
    object_id: ObjectId,
    id: String,
    title: String,
    author: String,
    year: i32,
    genre: String,
    publisher: String,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

impl BookDocument {
    fn from_book(book: &Book) -> anyhow::Result<Self> {
        Ok(Self {
            object_id: parse_object_id(&book.object_id)
                .with_context(|| format!("'{}' is not an ObjectId", book.object_id))?,
            id: book.id.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            year: book.year,
            genre: book.genre.clone(),
            publisher: book.publisher.clone(),
            created_at: BsonDateTime::from_millis(book.created_at.timestamp_millis()),
            updated_at: BsonDateTime::from_millis(book.updated_at.timestamp_millis()),
        })
    }

    fn into_book(self) -> anyhow::Result<Book> {
        Ok(Book {
            object_id: self.object_id.to_hex(),
            id: self.id,
            title: self.title,
            author: self.author,
            year: self.year,
            genre: self.genre,
            publisher: self.publisher,
            created_at: from_bson(self.created_at)?,
            updated_at: from_bson(self.updated_at)?,
        })
    }
}

fn from_bson(at: BsonDateTime) -> anyhow::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(at.timestamp_millis())
        .with_context(|| format!("timestamp {} out of range", at.timestamp_millis()))
}

/// Identifiers that are not ObjectIds cannot match any record.
fn parse_object_id(raw: &str) -> Option<ObjectId> {
    ObjectId::parse_str(raw).ok()
}

/// Update pipeline setting the supplied fields. Text goes through `$literal`
/// so values starting with `$` are not read as field paths.
fn patch_pipeline(patch: &BookPatch, now: DateTime<Utc>) -> Vec<Document> {
    let mut set = Document::new();
    let text = [
        ("title", &patch.title),
        ("author", &patch.author),
        ("genre", &patch.genre),
        ("publisher", &patch.publisher),
    ];
    for (field, value) in text {
        if let Some(value) = value {
            set.insert(field, doc! { "$literal": value.as_str() });
        }
    }
    if let Some(year) = patch.year {
        set.insert("year", Bson::Int32(year));
    }

    let now = BsonDateTime::from_millis(truncate_millis(now).timestamp_millis());
    set.insert(
        "updatedAt",
        doc! { "$max": [now, { "$add": ["$updatedAt", 1_i64] }] },
    );

    vec![doc! { "$set": set }]
}

fn newest_first() -> Document {
    doc! { "createdAt": -1, "_id": -1 }
}

pub struct MongoBookRepository {
    database: Database,
    collection: Collection<BookDocument>,
}

impl MongoBookRepository {
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
            collection: database.collection(COLLECTION),
        }
    }

    async fn collect(&self, filter: Document) -> anyhow::Result<Vec<Book>> {
        let documents: Vec<BookDocument> = self
            .collection
            .find(filter)
            .sort(newest_first())
            .await
            .context("find books")?
            .try_collect()
            .await
            .context("read book cursor")?;

        documents.into_iter().map(BookDocument::into_book).collect()
    }
}

#[async_trait]
impl BookRepository for MongoBookRepository {
    fn next_id(&self) -> String {
        ObjectId::new().to_hex()
    }

    async fn insert(&self, book: &Book) -> anyhow::Result<()> {
        let document = BookDocument::from_book(book)?;
        self.collection
            .insert_one(&document)
            .await
            .with_context(|| format!("insert book '{}'", book.id))?;
        Ok(())
    }

    async fn find(&self, object_id: &str) -> anyhow::Result<Option<Book>> {
        let Some(oid) = parse_object_id(object_id) else {
            return Ok(None);
        };
        self.collection
            .find_one(doc! { "_id": oid })
            .await
            .with_context(|| format!("find book '{}'", object_id))?
            .map(BookDocument::into_book)
            .transpose()
    }

    async fn list(&self) -> anyhow::Result<Vec<Book>> {
        self.collect(doc! {}).await
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<Book>> {
        self.collect(doc! { "$text": { "$search": query } }).await
    }

    async fn update(
        &self,
        object_id: &str,
        patch: &BookPatch,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<Book>> {
        let Some(oid) = parse_object_id(object_id) else {
            return Ok(None);
        };
        self.collection
            .find_one_and_update(doc! { "_id": oid }, patch_pipeline(patch, now))
            .return_document(ReturnDocument::After)
            .await
            .with_context(|| format!("update book '{}'", object_id))?
            .map(BookDocument::into_book)
            .transpose()
    }

    async fn remove(&self, object_id: &str) -> anyhow::Result<Option<Book>> {
        let Some(oid) = parse_object_id(object_id) else {
            return Ok(None);
        };
        self.collection
            .find_one_and_delete(doc! { "_id": oid })
            .await
            .with_context(|| format!("delete book '{}'", object_id))?
            .map(BookDocument::into_book)
            .transpose()
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("ping")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::BookInput;

    #[test]
    fn document_conversion_keeps_identity_and_millis() {
        let draft = BookInput {
            title: Some("Dune".to_string()),
            author: Some("Herbert".to_string()),
            year: Some(1965),
            genre: Some("Science Fiction".to_string()),
            publisher: Some("Chilton".to_string()),
        }
        .into_draft()
        .unwrap();
        let book = Book::new(ObjectId::new().to_hex(), draft, Utc::now());

        let restored = BookDocument::from_book(&book)
            .unwrap()
            .into_book()
            .unwrap();
        assert_eq!(restored, book);
    }

    #[test]
    fn pipeline_sets_only_supplied_fields() {
        let patch = BookPatch {
            title: Some("$where".to_string()),
            year: Some(1969),
            ..BookPatch::default()
        };
        let pipeline = patch_pipeline(&patch, Utc::now());
        assert_eq!(pipeline.len(), 1);

        let set = pipeline[0].get_document("$set").unwrap();
        let keys: Vec<&str> = set.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["title", "year", "updatedAt"]);
        assert_eq!(
            set.get_document("title").unwrap().get_str("$literal").unwrap(),
            "$where"
        );
        assert_eq!(set.get_i32("year").unwrap(), 1969);
    }

    #[test]
    fn non_object_ids_never_match() {
        assert!(parse_object_id("book_123").is_none());
        assert!(parse_object_id(&ObjectId::new().to_hex()).is_some());
    }
}
