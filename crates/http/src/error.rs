//! Error handling for the bookshelf HTTP and GraphQL layers

use async_graphql::ErrorExtensions;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Application error types that map to HTTP responses and GraphQL errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("not found: {message}")]
    NotFound { message: String, code: String },

    #[error("unauthorized: {message}")]
    Unauthorized { message: String, code: String },

    /// Storage unreachable or timed out. The caller may retry.
    #[error("unavailable: {message}")]
    Unavailable { message: String, code: String },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            code: "not_found".to_string(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            code: "unauthorized".to_string(),
        }
    }

    /// Create an infrastructure error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
            code: "infrastructure_error".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            AppError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Unauthorized { code, .. }
            | AppError::Unavailable { code, .. } => code,
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Unavailable { .. })
    }

    fn details(&self) -> Vec<serde_json::Value> {
        match self {
            AppError::Validation { details, .. } => details.clone(),
            _ => Vec::new(),
        }
    }

    /// Message safe to show to the end user.
    fn public_message(&self) -> String {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Unauthorized { message, .. }
            | AppError::Unavailable { message, .. } => message.clone(),
            // In release builds internal details stay in the logs
            AppError::Internal(_) if cfg!(not(debug_assertions)) => {
                "An internal server error occurred".to_string()
            }
            AppError::Internal(e) => e.to_string(),
        }
    }

    fn log(&self, error_id: &Uuid) {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                error_id = %error_id,
                error_code = %self.code(),
                status_code = %status.as_u16(),
                error = %self,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_id = %error_id,
                error_code = %self.code(),
                status_code = %status.as_u16(),
                "Request rejected"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::now_v7();
        let timestamp = OffsetDateTime::now_utc().to_string();
        self.log(&error_id);

        let status = self.status();
        let error_response = json!({
            "error": {
                "code": self.code(),
                "message": self.public_message(),
                "details": self.details(),
                "retryable": self.is_retryable(),
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            }
        });

        (status, Json(error_response)).into_response()
    }
}

impl ErrorExtensions for AppError {
    fn extend(&self) -> async_graphql::Error {
        let error_id = Uuid::now_v7();
        let timestamp = OffsetDateTime::now_utc().to_string();
        self.log(&error_id);

        let details = async_graphql::Value::from_json(serde_json::Value::Array(self.details()))
            .unwrap_or(async_graphql::Value::Null);

        async_graphql::Error::new(self.public_message()).extend_with(|_, extensions| {
            extensions.set("code", self.code());
            extensions.set("details", details);
            extensions.set("retryable", self.is_retryable());
            extensions.set("trace_id", error_id.to_string());
            extensions.set("timestamp", timestamp);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;

    #[test]
    fn test_validation_error() {
        let details = vec![serde_json::json!({"field": "title", "error": "required"})];
        let error = AppError::validation(details.clone(), "Validation failed");

        match error {
            AppError::Validation {
                details: d,
                code,
                message,
            } => {
                assert_eq!(d, details);
                assert_eq!(code, "validation_error");
                assert_eq!(message, "Validation failed");
            }
            _ => panic!("Expected Validation error"),
        }
    }

    #[test]
    fn test_error_response_mapping() {
        let error = AppError::not_found("Resource not found");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let error = AppError::unavailable("storage timed out");
        assert!(error.is_retryable());
        assert_eq!(error.code(), "infrastructure_error");
        assert_eq!(error.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_internal_error_mapping() {
        let internal_error = anyhow::anyhow!("Database connection failed");
        let error = AppError::Internal(internal_error);
        assert!(!error.is_retryable());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_error_response_format() {
        let error = AppError::not_found("Test resource not found");
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "not_found");
        assert_eq!(body["error"]["message"], "Test resource not found");
        assert_eq!(body["error"]["retryable"], false);
        assert!(body["error"]["trace_id"].is_string());
        assert!(body["error"]["timestamp"].is_string());
    }

    #[test]
    fn test_graphql_extensions() {
        let error = AppError::validation(
            vec![serde_json::json!({"field": "author", "error": "required"})],
            "author is required",
        )
        .extend();

        assert_eq!(error.message, "author is required");
        let extensions = error.extensions.expect("extensions are set");
        assert_eq!(
            extensions.get("code"),
            Some(&async_graphql::Value::from("validation_error"))
        );
        assert_eq!(
            extensions.get("retryable"),
            Some(&async_graphql::Value::from(false))
        );
        assert!(extensions.get("trace_id").is_some());
    }
}
