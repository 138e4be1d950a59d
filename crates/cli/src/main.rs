use std::sync::Arc;

use anyhow::Context;
use bookshelf_client::{GraphqlGateway, SyncController, TracingNotifier};
use bookshelf_db::DocumentStore;
use bookshelf_kernel::settings::Settings;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "bookshelf", version, about = "Book catalog service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the GraphQL server until interrupted
    Serve,
    /// Print the resolved configuration
    Config,
    /// Check that the configured database answers
    Ping,
    /// Fetch the catalog from a running server and print it
    List {
        /// GraphQL endpoint, e.g. http://localhost:5000/graphql
        #[arg(long, default_value = "http://localhost:5000/graphql")]
        endpoint: String,
        /// Bearer token sent with the request
        #[arg(long, env = "AUTH_TOKEN")]
        token: Option<String>,
        /// Case-insensitive filter on title, author, genre or publisher
        #[arg(long, default_value = "")]
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load bookshelf settings")?;
    bookshelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookshelf_app::serve(settings).await,
        Command::Config => {
            println!("{:#?}", settings);
            Ok(())
        }
        Command::Ping => {
            let store = DocumentStore::connect(&settings.database)
                .await
                .context("database unreachable")?;
            store.ping().await?;
            println!("ok: {}", settings.database.name);
            store.shutdown().await;
            Ok(())
        }
        Command::List {
            endpoint,
            token,
            query,
        } => list(endpoint, token, &query).await,
    }
}

async fn list(endpoint: String, token: Option<String>, query: &str) -> anyhow::Result<()> {
    let mut gateway = GraphqlGateway::new(endpoint);
    if let Some(token) = token {
        gateway = gateway.with_token(token);
    }

    let mut controller = SyncController::new(Arc::new(gateway), Arc::new(TracingNotifier));
    controller.fetch().await.context("failed to fetch books")?;
    tracing::debug!(total = controller.state().books.len(), "catalog fetched");

    for book in controller.visible(query) {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            book.object_id, book.title, book.author, book.year, book.genre, book.publisher
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_defaults_to_local_endpoint() {
        let cli = Cli::try_parse_from(["bookshelf", "list", "--query", "dune"]).unwrap();
        match cli.command {
            Command::List {
                endpoint, query, ..
            } => {
                assert_eq!(endpoint, "http://localhost:5000/graphql");
                assert_eq!(query, "dune");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
