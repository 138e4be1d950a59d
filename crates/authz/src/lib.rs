//! Shared-secret authorization.
//!
//! A single pre-shared token guards a configurable set of GraphQL operations.
//! The token is read from `Authorization: Bearer <token>`.

use std::collections::HashSet;

use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use bookshelf_kernel::settings::AuthSettings;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authentication header is missing")]
    MissingHeader,
    #[error("Authentication failed")]
    InvalidToken,
}

/// Raw `Authorization` header value captured from the incoming request.
#[derive(Debug, Clone, Default)]
pub struct Credential(Option<String>);

impl Credential {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let value = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self(value)
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self(Some(format!("Bearer {}", token.into())))
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    /// The token part of a `Bearer` credential.
    fn token(&self) -> Option<&str> {
        let header = self.0.as_deref()?;
        let (scheme, token) = header.split_once(' ')?;
        if scheme.eq_ignore_ascii_case("bearer") {
            Some(token.trim())
        } else {
            None
        }
    }
}

/// Which operations need the shared token, and what the token is.
#[derive(Debug, Clone)]
pub struct BearerPolicy {
    secret: Option<String>,
    protected: HashSet<String>,
}

impl BearerPolicy {
    pub fn new<I, S>(secret: Option<String>, protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            secret: secret.filter(|secret| !secret.is_empty()),
            protected: protected.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &AuthSettings) -> Self {
        let policy = Self::new(
            settings.token.clone(),
            settings.protected_operations.iter().cloned(),
        );
        if !policy.is_enabled() && !policy.protected.is_empty() {
            tracing::warn!(
                target: "bookshelf-authz",
                operations = ?settings.protected_operations,
                "no auth token configured; protected operations are open"
            );
        }
        policy
    }

    /// A policy without a configured secret lets everything through.
    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Whether `operation` needs a matching bearer token.
    pub fn is_protected(&self, operation: &str) -> bool {
        self.is_enabled() && self.protected.contains(operation)
    }

    pub fn authorize(&self, operation: &str, credential: &Credential) -> Result<(), AuthError> {
        if !self.is_protected(operation) {
            return Ok(());
        }
        let Some(secret) = self.secret.as_deref() else {
            return Ok(());
        };
        if !credential.is_present() {
            tracing::debug!(target: "bookshelf-authz", operation, "missing credential");
            return Err(AuthError::MissingHeader);
        }
        match credential.token() {
            Some(token) if token == secret => Ok(()),
            _ => {
                tracing::debug!(target: "bookshelf-authz", operation, "credential rejected");
                Err(AuthError::InvalidToken)
            }
        }
    }
}
