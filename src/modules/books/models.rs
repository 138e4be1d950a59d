use async_graphql::InputObject;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of the human-facing identifier derived from the storage id.
pub const SECONDARY_ID_PREFIX: &str = "book_";

/// Derive the human-facing identifier from the storage-assigned one.
pub fn secondary_id(object_id: &str) -> String {
    format!("{}{}", SECONDARY_ID_PREFIX, object_id)
}

/// A persisted book record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Storage-assigned opaque identifier
    #[serde(rename = "_id")]
    pub object_id: String,
    /// Human-facing identifier, fixed at creation
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    pub publisher: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Build a new record from validated fields. Both timestamps are `now`.
    pub fn new(object_id: String, draft: BookDraft, now: DateTime<Utc>) -> Self {
        let now = truncate_millis(now);
        Self {
            id: secondary_id(&object_id),
            object_id,
            title: draft.title,
            author: draft.author,
            year: draft.year,
            genre: draft.genre,
            publisher: draft.publisher,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply the supplied fields and bump the modification time.
    ///
    /// `updated_at` always moves forward, even when the clock has not advanced
    /// a full millisecond since the previous write.
    pub fn apply(&mut self, patch: BookPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(author) = patch.author {
            self.author = author;
        }
        if let Some(year) = patch.year {
            self.year = year;
        }
        if let Some(genre) = patch.genre {
            self.genre = genre;
        }
        if let Some(publisher) = patch.publisher {
            self.publisher = publisher;
        }

        let floor = self.updated_at + Duration::milliseconds(1);
        self.updated_at = truncate_millis(now).max(floor);
    }
}

/// Storage keeps millisecond precision, so the domain does too.
pub fn truncate_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(Duration::milliseconds(1)).unwrap_or(at)
}

/// Fields accepted by create and update. Every field is optional on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, InputObject)]
pub struct BookInput {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub publisher: Option<String>,
}

/// A rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub error: &'static str,
}

impl FieldViolation {
    fn required(field: &'static str) -> Self {
        Self {
            field,
            error: "required",
        }
    }

    fn empty(field: &'static str) -> Self {
        Self {
            field,
            error: "must not be empty",
        }
    }
}

/// Complete, validated field set for a new record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    pub publisher: String,
}

/// Validated subset of fields for an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub year: Option<i32>,
    pub genre: Option<String>,
    pub publisher: Option<String>,
}

impl BookInput {
    /// Every field must be present and text fields non-blank.
    pub fn into_draft(self) -> Result<BookDraft, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        let title = required_text("title", self.title, &mut violations);
        let author = required_text("author", self.author, &mut violations);
        let year = self.year;
        if year.is_none() {
            violations.push(FieldViolation::required("year"));
        }
        let genre = required_text("genre", self.genre, &mut violations);
        let publisher = required_text("publisher", self.publisher, &mut violations);

        match (title, author, year, genre, publisher) {
            (Some(title), Some(author), Some(year), Some(genre), Some(publisher))
                if violations.is_empty() =>
            {
                Ok(BookDraft {
                    title,
                    author,
                    year,
                    genre,
                    publisher,
                })
            }
            _ => Err(violations),
        }
    }

    /// Absent fields stay untouched; supplied text fields must be non-blank.
    pub fn into_patch(self) -> Result<BookPatch, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        let patch = BookPatch {
            title: optional_text("title", self.title, &mut violations),
            author: optional_text("author", self.author, &mut violations),
            year: self.year,
            genre: optional_text("genre", self.genre, &mut violations),
            publisher: optional_text("publisher", self.publisher, &mut violations),
        };

        if violations.is_empty() {
            Ok(patch)
        } else {
            Err(violations)
        }
    }
}

fn required_text(
    field: &'static str,
    value: Option<String>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match value {
        None => {
            violations.push(FieldViolation::required(field));
            None
        }
        Some(value) => optional_text(field, Some(value), violations),
    }
}

fn optional_text(
    field: &'static str,
    value: Option<String>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    let value = value?;
    if value.trim().is_empty() {
        violations.push(FieldViolation::empty(field));
        None
    } else {
        Some(value)
    }
}
