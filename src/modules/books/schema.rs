//! GraphQL surface of the books module.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, ErrorExtensions, Object, Result, Schema, ID};
use bookshelf_authz::{BearerPolicy, Credential};
use bookshelf_http::error::AppError;
use chrono::{DateTime, Utc};

use super::models::{Book, BookInput};
use super::store::{BookError, BookStore};

pub type BookSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(store: BookStore, policy: Arc<BearerPolicy>, introspection: bool) -> BookSchema {
    let builder = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(store)
        .data(policy);

    if introspection {
        builder.finish()
    } else {
        builder.disable_introspection().finish()
    }
}

fn gateway_error(error: BookError) -> async_graphql::Error {
    AppError::from(error).extend()
}

/// Check the request credential against the policy for `operation`.
fn authorize(ctx: &Context<'_>, operation: &str) -> Result<()> {
    let policy = ctx.data::<Arc<BearerPolicy>>()?;
    let anonymous = Credential::default();
    let credential = ctx.data_opt::<Credential>().unwrap_or(&anonymous);

    policy
        .authorize(operation, credential)
        .map_err(|err| AppError::unauthorized(err.to_string()).extend())
}

#[Object]
impl Book {
    #[graphql(name = "_id")]
    async fn object_id(&self) -> ID {
        ID(self.object_id.clone())
    }

    async fn id(&self) -> ID {
        ID(self.id.clone())
    }

    async fn title(&self) -> &str {
        &self.title
    }

    async fn author(&self) -> &str {
        &self.author
    }

    async fn year(&self) -> i32 {
        self.year
    }

    async fn genre(&self) -> &str {
        &self.genre
    }

    async fn publisher(&self) -> &str {
        &self.publisher
    }

    async fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    async fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// All books, newest first.
    async fn book_list(&self, ctx: &Context<'_>) -> Result<Vec<Book>> {
        authorize(ctx, "bookList")?;
        ctx.data::<BookStore>()?.list().await.map_err(gateway_error)
    }

    async fn book(&self, ctx: &Context<'_>, id: ID) -> Result<Book> {
        authorize(ctx, "book")?;
        ctx.data::<BookStore>()?.get(&id).await.map_err(gateway_error)
    }

    /// Keyword search over title, author, genre and publisher.
    async fn book_search(&self, ctx: &Context<'_>, query: String) -> Result<Vec<Book>> {
        authorize(ctx, "bookSearch")?;
        ctx.data::<BookStore>()?
            .search(&query)
            .await
            .map_err(gateway_error)
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn book_create(&self, ctx: &Context<'_>, input: BookInput) -> Result<Book> {
        authorize(ctx, "bookCreate")?;
        ctx.data::<BookStore>()?
            .create(input)
            .await
            .map_err(gateway_error)
    }

    async fn book_update(&self, ctx: &Context<'_>, id: ID, input: BookInput) -> Result<Book> {
        authorize(ctx, "bookUpdate")?;
        ctx.data::<BookStore>()?
            .update(&id, input)
            .await
            .map_err(gateway_error)
    }

    /// Returns the removed record.
    async fn book_delete(&self, ctx: &Context<'_>, id: ID) -> Result<Book> {
        authorize(ctx, "bookDelete")?;
        ctx.data::<BookStore>()?
            .delete(&id)
            .await
            .map_err(gateway_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::memory::MemoryBookRepository;
    use crate::modules::books::models::BookPatch;
    use crate::modules::books::store::BookRepository;
    use async_trait::async_trait;
    use async_graphql::{Request, Variables};
    use serde_json::{json, Value};

    fn schema(secret: Option<&str>) -> BookSchema {
        let store = BookStore::new(Arc::new(MemoryBookRepository::new()));
        let policy = BearerPolicy::new(secret.map(str::to_string), ["bookCreate"]);
        build_schema(store, Arc::new(policy), true)
    }

    async fn run(schema: &BookSchema, request: Request) -> (Value, Vec<async_graphql::ServerError>) {
        let response = schema.execute(request).await;
        let data = response.data.into_json().unwrap();
        (data, response.errors)
    }

    const CREATE: &str = r#"mutation Create($input: BookInput!) {
        bookCreate(input: $input) { _id id title author year genre publisher createdAt updatedAt }
    }"#;

    fn dune() -> Variables {
        Variables::from_json(json!({
            "input": {
                "title": "Dune",
                "author": "Herbert",
                "year": 1965,
                "genre": "Science Fiction",
                "publisher": "Chilton"
            }
        }))
    }

    #[tokio::test]
    async fn dune_lifecycle() {
        let schema = schema(None);

        let (data, errors) = run(&schema, Request::new(CREATE).variables(dune())).await;
        assert!(errors.is_empty(), "{:?}", errors);
        let created = &data["bookCreate"];
        let object_id = created["_id"].as_str().unwrap().to_string();
        assert!(!object_id.is_empty());
        assert!(created["id"].as_str().unwrap().starts_with("book_"));
        assert_eq!(created["createdAt"], created["updatedAt"]);

        let update = format!(
            r#"mutation {{ bookUpdate(id: "{}", input: {{ year: 1966 }}) {{ _id title year createdAt updatedAt }} }}"#,
            object_id
        );
        let (data, errors) = run(&schema, Request::new(update)).await;
        assert!(errors.is_empty(), "{:?}", errors);
        let updated = &data["bookUpdate"];
        assert_eq!(updated["_id"], object_id.as_str());
        assert_eq!(updated["year"], 1966);
        assert_eq!(updated["title"], "Dune");
        assert_ne!(updated["updatedAt"], created["createdAt"]);

        let delete = format!(r#"mutation {{ bookDelete(id: "{}") {{ _id }} }}"#, object_id);
        let (_, errors) = run(&schema, Request::new(delete)).await;
        assert!(errors.is_empty(), "{:?}", errors);

        let get = format!(r#"{{ book(id: "{}") {{ _id }} }}"#, object_id);
        let (_, errors) = run(&schema, Request::new(get)).await;
        assert_eq!(errors.len(), 1);
        let code = errors[0]
            .extensions
            .as_ref()
            .and_then(|ext| ext.get("code"))
            .cloned();
        assert_eq!(code, Some(async_graphql::Value::from("not_found")));
    }

    #[tokio::test]
    async fn missing_fields_surface_validation_error() {
        let schema = schema(None);
        let request = Request::new(CREATE).variables(Variables::from_json(json!({
            "input": { "title": "Dune", "year": 1965 }
        })));

        let (_, errors) = run(&schema, request).await;
        assert_eq!(errors.len(), 1);
        let extensions = errors[0].extensions.as_ref().unwrap();
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("validation_error"))
        );

        let (data, _) = run(&schema, Request::new("{ bookList { _id } }")).await;
        assert_eq!(data["bookList"], json!([]));
    }

    #[tokio::test]
    async fn protected_create_requires_matching_token() {
        let schema = schema(Some("s3cret"));

        let (_, errors) = run(&schema, Request::new(CREATE).variables(dune())).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Authentication header is missing");

        let request = Request::new(CREATE)
            .variables(dune())
            .data(Credential::bearer("wrong"));
        let (_, errors) = run(&schema, request).await;
        assert_eq!(errors[0].message, "Authentication failed");

        let request = Request::new(CREATE)
            .variables(dune())
            .data(Credential::bearer("s3cret"));
        let (data, errors) = run(&schema, request).await;
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(data["bookCreate"]["title"], "Dune");

        // Listing stays open under the default policy
        let (data, errors) = run(&schema, Request::new("{ bookList { title } }")).await;
        assert!(errors.is_empty());
        assert_eq!(data["bookList"][0]["title"], "Dune");
    }

    #[tokio::test]
    async fn search_finds_by_keyword() {
        let schema = schema(None);
        run(&schema, Request::new(CREATE).variables(dune())).await;

        let (data, errors) =
            run(&schema, Request::new(r#"{ bookSearch(query: "chilton") { title } }"#)).await;
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(data["bookSearch"][0]["title"], "Dune");
    }

    /// Storage whose every call fails like an unreachable database.
    struct DownRepository;

    #[async_trait]
    impl BookRepository for DownRepository {
        fn next_id(&self) -> String {
            "65f0c0ffee0000000000abcd".to_string()
        }

        async fn insert(&self, _book: &Book) -> anyhow::Result<()> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn find(&self, _object_id: &str) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn list(&self) -> anyhow::Result<Vec<Book>> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn search(&self, _query: &str) -> anyhow::Result<Vec<Book>> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn update(
            &self,
            _object_id: &str,
            _patch: &BookPatch,
            _now: DateTime<Utc>,
        ) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn remove(&self, _object_id: &str) -> anyhow::Result<Option<Book>> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }

        async fn ping(&self) -> anyhow::Result<()> {
            anyhow::bail!("server selection timeout: db-0.internal:27017")
        }
    }

    #[tokio::test]
    async fn storage_outage_surfaces_retryable_infrastructure_error() {
        let store = BookStore::new(Arc::new(DownRepository));
        let policy = BearerPolicy::new(None, ["bookCreate"]);
        let schema = build_schema(store, Arc::new(policy), true);

        for request in [
            Request::new("{ bookList { _id } }"),
            Request::new(CREATE).variables(dune()),
        ] {
            let (_, errors) = run(&schema, request).await;
            assert_eq!(errors.len(), 1);
            let extensions = errors[0].extensions.as_ref().unwrap();
            assert_eq!(
                extensions.get("code"),
                Some(&async_graphql::Value::from("infrastructure_error"))
            );
            assert_eq!(
                extensions.get("retryable"),
                Some(&async_graphql::Value::from(true))
            );
            assert!(!errors[0].message.contains("db-0.internal"));
        }
    }
}
