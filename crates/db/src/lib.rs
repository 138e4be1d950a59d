//! MongoDB connection handling for bookshelf.
//!
//! The client owns a bounded connection pool. It is created once at startup
//! and shut down when the process exits.

use std::time::Duration;

use anyhow::Context;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::IndexSpec;
use mongodb::bson::{doc, Document};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Database, IndexModel};

const APP_NAME: &str = "bookshelf";

/// Connected client plus the database selected by configuration.
pub struct DocumentStore {
    client: Client,
    database: Database,
}

impl DocumentStore {
    /// Build the client and verify the deployment answers a ping.
    pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<Self> {
        let options = client_options(settings).await?;
        let client = Client::with_options(options).context("failed to build MongoDB client")?;
        let database = client.database(&settings.name);

        let store = Self { client, database };
        store
            .ping()
            .await
            .with_context(|| format!("MongoDB at database '{}' is unreachable", settings.name))?;

        tracing::info!(
            target: "bookshelf-db",
            database = %settings.name,
            min_pool = settings.min_pool_size,
            max_pool = settings.max_pool_size,
            "connected to MongoDB"
        );

        Ok(store)
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub async fn ping(&self) -> anyhow::Result<()> {
        self.database
            .run_command(doc! { "ping": 1 })
            .await
            .context("ping failed")?;
        Ok(())
    }

    /// Create every declared index. Existing identical indexes are a no-op.
    pub async fn ensure_indexes(&self, indexes: &[(String, IndexSpec)]) -> anyhow::Result<()> {
        for (module, index) in indexes {
            tracing::info!(
                target: "bookshelf-db",
                module = %module,
                collection = index.collection,
                index = index.name,
                "ensuring index"
            );

            self.database
                .collection::<Document>(index.collection)
                .create_index(index_model(index))
                .await
                .with_context(|| {
                    format!(
                        "failed to create index '{}' for module '{}'",
                        index.name, module
                    )
                })?;
        }

        Ok(())
    }

    /// Close pooled connections and wait for in-flight operations.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
        tracing::info!(target: "bookshelf-db", "MongoDB client shut down");
    }
}

async fn client_options(settings: &DatabaseSettings) -> anyhow::Result<ClientOptions> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .context("invalid MongoDB connection string")?;

    options.app_name = Some(APP_NAME.to_string());
    options.min_pool_size = Some(settings.min_pool_size);
    options.max_pool_size = Some(settings.max_pool_size);
    options.server_selection_timeout = Some(Duration::from_millis(
        settings.server_selection_timeout_ms,
    ));
    options.connect_timeout = Some(Duration::from_millis(settings.connect_timeout_ms));
    options.retry_writes = Some(settings.retry_writes);

    Ok(options)
}

fn index_model(index: &IndexSpec) -> IndexModel {
    let mut options = IndexOptions::default();
    options.name = Some(index.name.to_string());
    if index.unique {
        options.unique = Some(true);
    }
    options.default_language = index.default_language.map(str::to_string);

    IndexModel::builder()
        .keys(index.keys.clone())
        .options(options)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_model_carries_text_options() {
        let spec = IndexSpec {
            collection: "books",
            name: "books_text",
            keys: doc! { "title": "text", "author": "text" },
            unique: false,
            default_language: Some("none"),
        };

        let model = index_model(&spec);
        let options = model.options.expect("options are always set");
        assert_eq!(options.name.as_deref(), Some("books_text"));
        assert_eq!(options.default_language.as_deref(), Some("none"));
        assert_eq!(options.unique, None);
        assert_eq!(model.keys, spec.keys);
    }

    #[test]
    fn index_model_marks_unique() {
        let spec = IndexSpec {
            collection: "books",
            name: "books_id_unique",
            keys: doc! { "id": 1 },
            unique: true,
            default_language: None,
        };

        let options = index_model(&spec).options.expect("options are always set");
        assert_eq!(options.unique, Some(true));
    }
}
