pub mod memory;
pub mod models;
pub mod mongo;
pub mod routes;
pub mod schema;
pub mod store;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use bookshelf_authz::BearerPolicy;
use bookshelf_kernel::settings::StorageBackend;
use bookshelf_kernel::{IndexSpec, InitCtx, Module};
use mongodb::bson::doc;
use once_cell::sync::OnceCell;

use memory::MemoryBookRepository;
use mongo::MongoBookRepository;
use schema::BookSchema;
use store::{BookRepository, BookStore};

/// Everything the module builds during `init`.
struct Wiring {
    store: BookStore,
    schema: BookSchema,
    graphql_path: String,
    graphiql: bool,
}

/// Book catalog: record store plus its GraphQL gateway
pub struct BooksModule {
    repository: OnceCell<Arc<dyn BookRepository>>,
    wiring: OnceCell<Wiring>,
}

impl BooksModule {
    pub fn new() -> Self {
        Self {
            repository: OnceCell::new(),
            wiring: OnceCell::new(),
        }
    }

    /// Use `repository` instead of picking one from the settings.
    pub fn with_repository(repository: Arc<dyn BookRepository>) -> Self {
        let module = Self::new();
        // A fresh cell is always empty
        let _ = module.repository.set(repository);
        module
    }

    fn select_repository(&self, ctx: &InitCtx<'_>) -> anyhow::Result<Arc<dyn BookRepository>> {
        if let Some(repository) = self.repository.get() {
            return Ok(repository.clone());
        }

        let repository: Arc<dyn BookRepository> = match ctx.settings.database.backend {
            StorageBackend::Memory => {
                tracing::warn!(module = self.name(), "using in-memory storage; data is not persisted");
                Arc::new(MemoryBookRepository::new())
            }
            StorageBackend::Mongodb => {
                let database = ctx
                    .database
                    .ok_or_else(|| anyhow!("mongodb backend selected but no database connected"))?;
                Arc::new(MongoBookRepository::new(database))
            }
        };

        Ok(self.repository.get_or_init(|| repository).clone())
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let store = BookStore::new(self.select_repository(ctx)?);
        let policy = Arc::new(BearerPolicy::from_settings(&ctx.settings.auth));
        let graphiql = ctx.settings.introspection_enabled();

        let wiring = Wiring {
            schema: schema::build_schema(store.clone(), policy, graphiql),
            store,
            graphql_path: ctx.settings.server.graphql_path.clone(),
            graphiql,
        };
        self.wiring
            .set(wiring)
            .map_err(|_| anyhow!("books module initialized twice"))?;

        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            backend = ?ctx.settings.database.backend,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.wiring.get() {
            Some(wiring) => routes::router(wiring.store.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init");
                Router::new()
            }
        }
    }

    fn endpoint(&self) -> Option<Router> {
        let wiring = self.wiring.get()?;
        Some(routes::graphql_router(
            wiring.schema.clone(),
            &wiring.graphql_path,
            wiring.graphiql,
        ))
    }

    fn indexes(&self) -> Vec<IndexSpec> {
        vec![
            IndexSpec {
                collection: mongo::COLLECTION,
                name: "books_id_unique",
                keys: doc! { "id": 1 },
                unique: true,
                default_language: None,
            },
            IndexSpec {
                collection: mongo::COLLECTION,
                name: "books_created_at",
                keys: doc! { "createdAt": -1 },
                unique: false,
                default_language: None,
            },
            IndexSpec {
                collection: mongo::COLLECTION,
                name: "books_text",
                keys: doc! {
                    "title": "text",
                    "author": "text",
                    "genre": "text",
                    "publisher": "text",
                },
                unique: false,
                default_language: Some("none"),
            },
        ]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

/// Create a new instance of the books module
pub fn create_module() -> Arc<dyn Module> {
    Arc::new(BooksModule::new())
}
