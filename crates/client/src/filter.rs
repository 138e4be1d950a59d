//! Local search over the in-memory list. Never touches the server.

use crate::model::BookRecord;

/// Case-insensitive substring match on title, author, genre or publisher.
pub fn matches(book: &BookRecord, query: &str) -> bool {
    let query = query.to_lowercase();
    [&book.title, &book.author, &book.genre, &book.publisher]
        .iter()
        .any(|field| field.to_lowercase().contains(&query))
}

/// Books matching `query`, in list order. An empty query keeps everything.
pub fn filter<'a>(books: &'a [BookRecord], query: &str) -> Vec<&'a BookRecord> {
    if query.is_empty() {
        return books.iter().collect();
    }
    books.iter().filter(|book| matches(book, query)).collect()
}
