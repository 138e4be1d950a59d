//! Transport to the book service.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::model::{BookInput, BookRecord};

const BOOK_FIELDS: &str = "_id id title author year genre publisher createdAt updatedAt";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a GraphQL error.
    #[error("{message}")]
    Rejected {
        code: Option<String>,
        message: String,
    },

    /// A non-success status whose body is not a GraphQL response.
    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("response carried no data")]
    EmptyResponse,

    #[error("unexpected response shape: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Error code reported by the service, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            GatewayError::Rejected { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Remote operations the synchronization layer relies on.
#[async_trait]
pub trait BookGateway: Send + Sync {
    async fn list(&self) -> Result<Vec<BookRecord>, GatewayError>;
    async fn get(&self, object_id: &str) -> Result<BookRecord, GatewayError>;
    async fn create(&self, input: &BookInput) -> Result<BookRecord, GatewayError>;
    async fn update(&self, object_id: &str, input: &BookInput)
        -> Result<BookRecord, GatewayError>;
    async fn delete(&self, object_id: &str) -> Result<BookRecord, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct Envelope {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
    #[serde(default)]
    extensions: Option<WireExtensions>,
}

#[derive(Debug, Deserialize)]
struct WireExtensions {
    code: Option<String>,
}

/// Pull `field` out of a GraphQL response body. The first error wins over any data.
fn parse_envelope<T: DeserializeOwned>(body: Value, field: &str) -> Result<T, GatewayError> {
    let envelope: Envelope = serde_json::from_value(body)?;

    if let Some(first) = envelope.errors.into_iter().next() {
        return Err(GatewayError::Rejected {
            code: first.extensions.and_then(|ext| ext.code),
            message: first.message,
        });
    }

    let mut data = envelope.data.ok_or(GatewayError::EmptyResponse)?;
    match data.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(GatewayError::EmptyResponse),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Error responses usually still carry a GraphQL envelope; only fall back to
/// the status when they do not.
fn decode_body<T: DeserializeOwned>(
    status: reqwest::StatusCode,
    bytes: &[u8],
    field: &str,
) -> Result<T, GatewayError> {
    match serde_json::from_slice::<Value>(bytes) {
        Ok(body) => parse_envelope(body, field),
        Err(_) if !status.is_success() => Err(GatewayError::Status(status.as_u16())),
        Err(err) => Err(err.into()),
    }
}

/// [`BookGateway`] speaking GraphQL over HTTP.
#[derive(Debug, Clone)]
pub struct GraphqlGateway {
    http: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl GraphqlGateway {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token: None,
        }
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        field: &str,
        query: String,
        variables: Value,
    ) -> Result<T, GatewayError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        tracing::debug!(endpoint = %self.endpoint, operation = field, "graphql request");
        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        decode_body(status, &bytes, field)
    }
}

#[async_trait]
impl BookGateway for GraphqlGateway {
    async fn list(&self) -> Result<Vec<BookRecord>, GatewayError> {
        let query = format!("query BookList {{ bookList {{ {} }} }}", BOOK_FIELDS);
        self.execute("bookList", query, json!({})).await
    }

    async fn get(&self, object_id: &str) -> Result<BookRecord, GatewayError> {
        let query = format!(
            "query Book($id: ID!) {{ book(id: $id) {{ {} }} }}",
            BOOK_FIELDS
        );
        self.execute("book", query, json!({ "id": object_id })).await
    }

    async fn create(&self, input: &BookInput) -> Result<BookRecord, GatewayError> {
        let query = format!(
            "mutation BookCreate($input: BookInput!) {{ bookCreate(input: $input) {{ {} }} }}",
            BOOK_FIELDS
        );
        self.execute("bookCreate", query, json!({ "input": input }))
            .await
    }

    async fn update(
        &self,
        object_id: &str,
        input: &BookInput,
    ) -> Result<BookRecord, GatewayError> {
        let query = format!(
            "mutation BookUpdate($id: ID!, $input: BookInput!) {{ bookUpdate(id: $id, input: $input) {{ {} }} }}",
            BOOK_FIELDS
        );
        self.execute(
            "bookUpdate",
            query,
            json!({ "id": object_id, "input": input }),
        )
        .await
    }

    async fn delete(&self, object_id: &str) -> Result<BookRecord, GatewayError> {
        let query = format!(
            "mutation BookDelete($id: ID!) {{ bookDelete(id: $id) {{ {} }} }}",
            BOOK_FIELDS
        );
        self.execute("bookDelete", query, json!({ "id": object_id }))
            .await
    }
}
