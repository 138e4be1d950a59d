use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Years more than this far ahead are rejected by the form.
const MAX_YEARS_AHEAD: i32 = 10;
const MIN_YEAR: i32 = 1000;

/// A book as returned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRecord {
    #[serde(rename = "_id")]
    pub object_id: String,
    pub id: String,
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    pub publisher: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields sent on create and update. Absent fields are left out of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
}

/// Form field name to message.
pub type FormErrors = BTreeMap<&'static str, &'static str>;

/// Editable form contents for the create and edit dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookForm {
    pub title: String,
    pub author: String,
    pub year: i32,
    pub genre: String,
    pub publisher: String,
}

impl BookForm {
    /// Empty form with the year preset to the current one.
    pub fn blank(today: DateTime<Utc>) -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            year: today.year(),
            genre: String::new(),
            publisher: String::new(),
        }
    }

    pub fn from_record(record: &BookRecord) -> Self {
        Self {
            title: record.title.clone(),
            author: record.author.clone(),
            year: record.year,
            genre: record.genre.clone(),
            publisher: record.publisher.clone(),
        }
    }

    /// Check the form before it is submitted.
    pub fn validate(&self, today: DateTime<Utc>) -> Result<BookInput, FormErrors> {
        let mut errors = FormErrors::new();

        if self.title.trim().is_empty() {
            errors.insert("title", "Title is required");
        }
        if self.author.trim().is_empty() {
            errors.insert("author", "Author is required");
        }
        if self.year < MIN_YEAR || self.year > today.year() + MAX_YEARS_AHEAD {
            errors.insert("year", "Please enter a valid year");
        }
        if self.genre.trim().is_empty() {
            errors.insert("genre", "Genre is required");
        }
        if self.publisher.trim().is_empty() {
            errors.insert("publisher", "Publisher is required");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(BookInput {
            title: Some(self.title.clone()),
            author: Some(self.author.clone()),
            year: Some(self.year),
            genre: Some(self.genre.clone()),
            publisher: Some(self.publisher.clone()),
        })
    }
}
