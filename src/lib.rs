//! Bookshelf application library
//!
//! Wires the book catalog module into the kernel lifecycle and serves it.

pub mod modules;
pub mod utils;

use anyhow::Context;
use bookshelf_db::DocumentStore;
use bookshelf_kernel::settings::{Settings, StorageBackend};
use bookshelf_kernel::{InitCtx, ModuleRegistry};

/// Re-export commonly used types
pub use modules::*;

/// Connect storage, run the module lifecycle and serve until a shutdown signal.
pub async fn serve(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        backend = ?settings.database.backend,
        "bookshelf bootstrap starting"
    );

    let store = match settings.database.backend {
        StorageBackend::Mongodb => Some(
            DocumentStore::connect(&settings.database)
                .await
                .context("failed to connect storage")?,
        ),
        StorageBackend::Memory => None,
    };

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let ctx = InitCtx {
        settings: &settings,
        database: store.as_ref().map(DocumentStore::database),
    };

    registry.init_modules(&ctx).await?;
    if let Some(store) = &store {
        store
            .ensure_indexes(&registry.collect_indexes())
            .await
            .context("failed to ensure indexes")?;
    }
    registry.start_modules(&ctx).await?;

    tracing::info!("bookshelf bootstrap complete");

    let served =
        bookshelf_http::start_server(&registry, &settings, bookshelf_http::shutdown_signal()).await;

    registry.stop_modules().await?;
    if let Some(store) = store {
        store.shutdown().await;
    }

    served
}
