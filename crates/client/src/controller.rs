//! Drives gateway calls and folds their outcomes into [`BookListState`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::gateway::{BookGateway, GatewayError};
use crate::model::{BookForm, BookInput, BookRecord, FormErrors};
use crate::notify::{Notice, Notifier};
use crate::state::{reduce, Action, BookListState, Dialog, Operation};

/// Owns the local projection of the server's book list.
///
/// Each operation dispatches `Started`, calls the gateway once, and then
/// dispatches the outcome. Failures are never retried; they are surfaced on
/// the operation's error banner and through the notifier, and the list is
/// left as it was.
pub struct SyncController {
    gateway: Arc<dyn BookGateway>,
    notifier: Arc<dyn Notifier>,
    state: BookListState,
}

impl SyncController {
    pub fn new(gateway: Arc<dyn BookGateway>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            gateway,
            notifier,
            state: BookListState::default(),
        }
    }

    pub fn state(&self) -> &BookListState {
        &self.state
    }

    /// Books matching `query`, in list order.
    pub fn visible(&self, query: &str) -> Vec<&BookRecord> {
        self.state.visible(query)
    }

    fn dispatch(&mut self, action: Action) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, action);
    }

    fn fail(&mut self, operation: Operation, error: &GatewayError) {
        let message = error.to_string();
        tracing::warn!(?operation, code = error.code(), error = %message, "book operation failed");
        self.notifier
            .notify(Notice::error(operation.failure_summary(), message.clone()));
        self.dispatch(Action::Failed {
            operation,
            message,
            at: Instant::now(),
        });
    }

    fn succeed(&mut self, action: Action, summary: &str) {
        self.dispatch(action);
        tracing::debug!(summary, "book operation succeeded");
        self.notifier.notify(Notice::success(summary));
    }

    /// Replace the local list with the server's.
    pub async fn fetch(&mut self) -> Result<(), GatewayError> {
        self.dispatch(Action::Started(Operation::List));
        match self.gateway.list().await {
            Ok(books) => {
                self.dispatch(Action::Listed(books));
                Ok(())
            }
            Err(err) => {
                self.fail(Operation::List, &err);
                Err(err)
            }
        }
    }

    pub async fn create(&mut self, input: &BookInput) -> Result<BookRecord, GatewayError> {
        self.dispatch(Action::Started(Operation::Create));
        match self.gateway.create(input).await {
            Ok(book) => {
                let action = Action::Created {
                    book: book.clone(),
                    at: Instant::now(),
                };
                self.succeed(action, "Book created successfully!");
                Ok(book)
            }
            Err(err) => {
                self.fail(Operation::Create, &err);
                Err(err)
            }
        }
    }

    pub async fn update(
        &mut self,
        object_id: &str,
        input: &BookInput,
    ) -> Result<BookRecord, GatewayError> {
        self.dispatch(Action::Started(Operation::Update));
        match self.gateway.update(object_id, input).await {
            Ok(book) => {
                let action = Action::Updated {
                    book: book.clone(),
                    at: Instant::now(),
                };
                self.succeed(action, "Book updated successfully!");
                Ok(book)
            }
            Err(err) => {
                self.fail(Operation::Update, &err);
                Err(err)
            }
        }
    }

    pub async fn delete(&mut self, object_id: &str) -> Result<(), GatewayError> {
        self.dispatch(Action::Started(Operation::Delete));
        match self.gateway.delete(object_id).await {
            Ok(removed) => {
                let action = Action::Deleted {
                    object_id: removed.object_id,
                    at: Instant::now(),
                };
                self.succeed(action, "Book deleted successfully!");
                Ok(())
            }
            Err(err) => {
                self.fail(Operation::Delete, &err);
                Err(err)
            }
        }
    }

    pub fn open_create(&mut self) {
        self.dispatch(Action::OpenCreate);
    }

    pub fn open_edit(&mut self, object_id: impl Into<String>) {
        self.dispatch(Action::OpenEdit(object_id.into()));
    }

    pub fn close_dialog(&mut self) {
        self.dispatch(Action::CloseDialog);
    }

    /// Form prefilled for the open dialog, or `None` when it is closed.
    pub fn form(&self) -> Option<BookForm> {
        match &self.state.dialog {
            Dialog::Closed => None,
            Dialog::Create => Some(BookForm::blank(Utc::now())),
            Dialog::Edit { .. } => self.state.editing().map(BookForm::from_record),
        }
    }

    /// Validate `form` and send it as a create or update, depending on the
    /// open dialog. Gateway failures land on the state, not in the result.
    pub async fn submit(&mut self, form: &BookForm) -> Result<(), FormErrors> {
        let input = form.validate(Utc::now())?;
        match self.state.dialog.clone() {
            Dialog::Create => {
                let _ = self.create(&input).await;
            }
            Dialog::Edit { object_id } => {
                let _ = self.update(&object_id, &input).await;
            }
            Dialog::Closed => {
                tracing::debug!("submit with no dialog open; ignoring");
            }
        }
        Ok(())
    }

    pub fn dismiss_error(&mut self, operation: Operation) {
        self.dispatch(Action::DismissError(operation));
    }

    pub fn dismiss_success(&mut self) {
        self.dispatch(Action::DismissSuccess);
    }

    /// Expire banners older than their lifetime. Call periodically.
    pub fn tick(&mut self) {
        self.dispatch(Action::Tick(Instant::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Severity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeGateway {
        books: Mutex<Vec<BookRecord>>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn check(&self) -> Result<(), GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected {
                    code: Some("infrastructure_error".to_string()),
                    message: "database unavailable".to_string(),
                });
            }
            Ok(())
        }

        fn not_found(object_id: &str) -> GatewayError {
            GatewayError::Rejected {
                code: Some("not_found".to_string()),
                message: format!("Book '{}' not found", object_id),
            }
        }
    }

    fn record(object_id: &str, input: &BookInput) -> BookRecord {
        BookRecord {
            object_id: object_id.to_string(),
            id: format!("book_{}", object_id),
            title: input.title.clone().unwrap_or_default(),
            author: input.author.clone().unwrap_or_default(),
            year: input.year.unwrap_or_default(),
            genre: input.genre.clone().unwrap_or_default(),
            publisher: input.publisher.clone().unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[async_trait]
    impl BookGateway for FakeGateway {
        async fn list(&self) -> Result<Vec<BookRecord>, GatewayError> {
            self.check()?;
            Ok(self.books.lock().unwrap().clone())
        }

        async fn get(&self, object_id: &str) -> Result<BookRecord, GatewayError> {
            self.check()?;
            let books = self.books.lock().unwrap();
            books
                .iter()
                .find(|b| b.object_id == object_id)
                .cloned()
                .ok_or_else(|| Self::not_found(object_id))
        }

        async fn create(&self, input: &BookInput) -> Result<BookRecord, GatewayError> {
            self.check()?;
            let mut books = self.books.lock().unwrap();
            let book = record(&format!("oid{}", books.len()), input);
            books.insert(0, book.clone());
            Ok(book)
        }

        async fn update(
            &self,
            object_id: &str,
            input: &BookInput,
        ) -> Result<BookRecord, GatewayError> {
            self.check()?;
            let mut books = self.books.lock().unwrap();
            let book = books
                .iter_mut()
                .find(|b| b.object_id == object_id)
                .ok_or_else(|| Self::not_found(object_id))?;
            if let Some(year) = input.year {
                book.year = year;
            }
            if let Some(title) = &input.title {
                book.title = title.clone();
            }
            Ok(book.clone())
        }

        async fn delete(&self, object_id: &str) -> Result<BookRecord, GatewayError> {
            self.check()?;
            let mut books = self.books.lock().unwrap();
            let index = books
                .iter()
                .position(|b| b.object_id == object_id)
                .ok_or_else(|| Self::not_found(object_id))?;
            Ok(books.remove(index))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<Notice>>,
    }

    impl RecordingNotifier {
        fn severities(&self) -> Vec<Severity> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .map(|n| n.severity)
                .collect()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().unwrap().push(notice);
        }
    }

    fn dune() -> BookInput {
        BookInput {
            title: Some("Dune".to_string()),
            author: Some("Herbert".to_string()),
            year: Some(1965),
            genre: Some("Science Fiction".to_string()),
            publisher: Some("Chilton".to_string()),
        }
    }

    fn controller() -> (SyncController, Arc<FakeGateway>, Arc<RecordingNotifier>) {
        let gateway = Arc::new(FakeGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = SyncController::new(gateway.clone(), notifier.clone());
        (controller, gateway, notifier)
    }

    #[tokio::test]
    async fn mutations_splice_without_refetching() {
        let (mut controller, gateway, notifier) = controller();
        controller.fetch().await.unwrap();
        assert!(controller.state().books.is_empty());

        let created = controller.create(&dune()).await.unwrap();
        let update = BookInput {
            year: Some(1966),
            ..BookInput::default()
        };
        controller.update(&created.object_id, &update).await.unwrap();
        assert_eq!(controller.state().books[0].year, 1966);

        controller.delete(&created.object_id).await.unwrap();
        assert!(controller.state().books.is_empty());

        // One list, one create, one update, one delete
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);
        assert_eq!(notifier.severities(), vec![Severity::Success; 3]);
    }

    #[tokio::test]
    async fn failure_leaves_list_untouched_and_notifies() {
        let (mut controller, gateway, notifier) = controller();
        controller.create(&dune()).await.unwrap();
        let before = controller.state().books.clone();

        gateway.failing.store(true, Ordering::SeqCst);
        let object_id = before[0].object_id.clone();
        assert!(controller.delete(&object_id).await.is_err());

        assert_eq!(controller.state().books, before);
        let banner = controller.state().delete.error.as_ref().unwrap();
        assert_eq!(banner.message, "database unavailable");
        assert!(!controller.state().delete.loading);

        let notices = notifier.notices.lock().unwrap();
        let last = notices.last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert_eq!(last.summary, "Failed to delete book");
        assert_eq!(last.detail.as_deref(), Some("database unavailable"));
        // No retry
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn submit_validates_before_calling_the_gateway() {
        let (mut controller, gateway, _) = controller();
        controller.open_create();

        let mut form = controller.form().unwrap();
        form.title = "Dune".to_string();
        let errors = controller.submit(&form).await.unwrap_err();
        assert!(errors.contains_key("author"));
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state().dialog, Dialog::Create);

        form.author = "Herbert".to_string();
        form.genre = "Science Fiction".to_string();
        form.publisher = "Chilton".to_string();
        controller.submit(&form).await.unwrap();
        assert_eq!(controller.state().dialog, Dialog::Closed);
        assert_eq!(controller.visible("herb").len(), 1);
    }

    #[tokio::test]
    async fn edit_dialog_prefills_and_updates_in_place() {
        let (mut controller, _, _) = controller();
        let created = controller.create(&dune()).await.unwrap();

        controller.open_edit(created.object_id.clone());
        let mut form = controller.form().unwrap();
        assert_eq!(form.title, "Dune");

        form.title = "Dune Messiah".to_string();
        controller.submit(&form).await.unwrap();
        assert_eq!(controller.state().books[0].title, "Dune Messiah");
        assert_eq!(controller.state().dialog, Dialog::Closed);
    }
}
