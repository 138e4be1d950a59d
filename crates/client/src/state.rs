//! View-model state and the reducer that folds operation outcomes into it.

use std::time::{Duration, Instant};

use crate::filter;
use crate::model::BookRecord;
use crate::notify::{ERROR_LIFETIME, SUCCESS_LIFETIME};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    List,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Fallback message when the failure carries no text.
    pub fn failure_summary(self) -> &'static str {
        match self {
            Operation::List => "Failed to fetch books",
            Operation::Create => "Failed to create book",
            Operation::Update => "Failed to update book",
            Operation::Delete => "Failed to delete book",
        }
    }
}

/// A message shown until it expires or is dismissed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub message: String,
    pub raised_at: Instant,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationStatus {
    pub loading: bool,
    pub error: Option<Banner>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Dialog {
    #[default]
    Closed,
    Create,
    Edit {
        object_id: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookListState {
    /// Newest first, as the server lists them.
    pub books: Vec<BookRecord>,
    pub dialog: Dialog,
    pub list: OperationStatus,
    pub create: OperationStatus,
    pub update: OperationStatus,
    pub delete: OperationStatus,
    pub success: Option<Banner>,
}

impl BookListState {
    pub fn status(&self, operation: Operation) -> &OperationStatus {
        match operation {
            Operation::List => &self.list,
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
        }
    }

    fn status_mut(&mut self, operation: Operation) -> &mut OperationStatus {
        match operation {
            Operation::List => &mut self.list,
            Operation::Create => &mut self.create,
            Operation::Update => &mut self.update,
            Operation::Delete => &mut self.delete,
        }
    }

    /// The record open in the edit dialog, if it is still in the list.
    pub fn editing(&self) -> Option<&BookRecord> {
        match &self.dialog {
            Dialog::Edit { object_id } => self.books.iter().find(|b| &b.object_id == object_id),
            _ => None,
        }
    }

    pub fn visible(&self, query: &str) -> Vec<&BookRecord> {
        filter::filter(&self.books, query)
    }

    /// Every error banner currently raised.
    pub fn errors(&self) -> impl Iterator<Item = &Banner> {
        [&self.list, &self.create, &self.update, &self.delete]
            .into_iter()
            .filter_map(|status| status.error.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Started(Operation),
    Listed(Vec<BookRecord>),
    Created { book: BookRecord, at: Instant },
    Updated { book: BookRecord, at: Instant },
    Deleted { object_id: String, at: Instant },
    Failed {
        operation: Operation,
        message: String,
        at: Instant,
    },
    OpenCreate,
    OpenEdit(String),
    CloseDialog,
    DismissError(Operation),
    DismissSuccess,
    /// Expire banners that have outlived their display time.
    Tick(Instant),
}

fn success(message: &str, at: Instant) -> Option<Banner> {
    Some(Banner {
        message: message.to_string(),
        raised_at: at,
    })
}

pub fn reduce(mut state: BookListState, action: Action) -> BookListState {
    match action {
        Action::Started(operation) => {
            let status = state.status_mut(operation);
            status.loading = true;
            status.error = None;
        }
        Action::Listed(books) => {
            state.list.loading = false;
            state.books = books;
        }
        Action::Created { book, at } => {
            state.create.loading = false;
            state.books.insert(0, book);
            state.success = success("Book created successfully!", at);
            if state.dialog == Dialog::Create {
                state.dialog = Dialog::Closed;
            }
        }
        Action::Updated { book, at } => {
            state.update.loading = false;
            if let Some(slot) = state
                .books
                .iter_mut()
                .find(|b| b.object_id == book.object_id)
            {
                *slot = book;
            }
            state.success = success("Book updated successfully!", at);
            if matches!(state.dialog, Dialog::Edit { .. }) {
                state.dialog = Dialog::Closed;
            }
        }
        Action::Deleted { object_id, at } => {
            state.delete.loading = false;
            state.books.retain(|b| b.object_id != object_id);
            state.success = success("Book deleted successfully!", at);
            if matches!(&state.dialog, Dialog::Edit { object_id: open } if *open == object_id) {
                state.dialog = Dialog::Closed;
            }
        }
        Action::Failed {
            operation,
            message,
            at,
        } => {
            let status = state.status_mut(operation);
            status.loading = false;
            status.error = Some(Banner {
                message,
                raised_at: at,
            });
        }
        Action::OpenCreate => state.dialog = Dialog::Create,
        Action::OpenEdit(object_id) => state.dialog = Dialog::Edit { object_id },
        Action::CloseDialog => state.dialog = Dialog::Closed,
        Action::DismissError(operation) => state.status_mut(operation).error = None,
        Action::DismissSuccess => state.success = None,
        Action::Tick(now) => {
            let expired = |banner: &Banner, life: Duration| {
                now.saturating_duration_since(banner.raised_at) >= life
            };

            for operation in [
                Operation::List,
                Operation::Create,
                Operation::Update,
                Operation::Delete,
            ] {
                let status = state.status_mut(operation);
                if status.error.as_ref().is_some_and(|b| expired(b, ERROR_LIFETIME)) {
                    status.error = None;
                }
            }
            if state
                .success
                .as_ref()
                .is_some_and(|b| expired(b, SUCCESS_LIFETIME))
            {
                state.success = None;
            }
        }
    }
    state
}
