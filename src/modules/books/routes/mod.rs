//! HTTP routes of the books module.

use async_graphql::http::GraphiQLSource;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use bookshelf_authz::Credential;
use bookshelf_http::error::AppError;

use super::schema::BookSchema;
use super::store::BookStore;
use crate::utils;

#[derive(Clone)]
struct GraphqlState {
    schema: BookSchema,
    path: String,
}

/// Module-scoped routes, mounted under `/api/books`.
pub fn router(store: BookStore) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(store)
}

/// The GraphQL endpoint at `path`. GET serves GraphiQL when enabled.
pub fn graphql_router(schema: BookSchema, path: &str, graphiql: bool) -> Router {
    let prefix = utils::log_prefix("books");
    tracing::info!(target: "bookshelf.routes", %prefix, path, graphiql, "registering GraphQL endpoint");

    let state = GraphqlState {
        schema,
        path: path.to_string(),
    };
    let route = if graphiql {
        get(graphiql_page).post(graphql_handler)
    } else {
        axum::routing::post(graphql_handler)
    };

    Router::new().route(path, route).with_state(state)
}

async fn graphql_handler(
    State(state): State<GraphqlState>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let credential = Credential::from_headers(&headers);
    state
        .schema
        .execute(request.into_inner().data(credential))
        .await
        .into()
}

async fn graphiql_page(State(state): State<GraphqlState>) -> impl IntoResponse {
    Html(GraphiQLSource::build().endpoint(&state.path).finish())
}

/// Storage readiness probe
async fn health_check(State(store): State<BookStore>) -> Result<&'static str, AppError> {
    store.ping().await.map_err(AppError::from)?;
    Ok("books module is healthy")
}
