//! Client synchronization layer for the bookshelf GraphQL service.
//!
//! The client keeps a local projection of the server's book list. Every
//! completed operation is folded into that projection by a pure reducer, so
//! the list is only refetched on an explicit `fetch`.

pub mod controller;
pub mod filter;
pub mod gateway;
pub mod model;
pub mod notify;
pub mod state;

pub use controller::SyncController;
pub use gateway::{BookGateway, GatewayError, GraphqlGateway};
pub use model::{BookForm, BookInput, BookRecord};
pub use notify::{Notice, Notifier, Severity, TracingNotifier};
pub use state::{reduce, Action, BookListState, Dialog, Operation};
