use async_trait::async_trait;
use axum::Router;
use mongodb::bson::Document;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
    /// Connected document database; `None` when running on the memory backend.
    pub database: Option<&'a mongodb::Database>,
}

/// Index a module needs on one of its collections.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub collection: &'static str,
    pub name: &'static str,
    pub keys: Document,
    pub unique: bool,
    /// Text indexes only; `"none"` disables stemming and stop words.
    pub default_language: Option<&'static str>,
}

/// Core module trait that all bookshelf modules must implement
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context
    /// Called during application startup before indexes are ensured
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return the Axum router for this module's routes
    /// Routes will be mounted under `/api/{module_name}`
    fn routes(&self) -> Router {
        Router::new()
    }

    /// Router merged at the application root, e.g. a GraphQL endpoint
    fn endpoint(&self) -> Option<Router> {
        None
    }

    /// Return indexes contributed by this module
    fn indexes(&self) -> Vec<IndexSpec> {
        vec![]
    }

    /// Called after indexes are in place
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Stop the module and clean up resources
    /// Called during application shutdown
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
