use std::error::Error as StdError;

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::repos::RepoError,
    cache::{CacheError, ToggleError},
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Error chain attached to failed responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Toggle(#[from] ToggleError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    /// Whether retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Cache(err) => err.is_retryable(),
            AppError::Toggle(err) => err.cache_error().is_some_and(CacheError::is_retryable),
            AppError::Repo(RepoError::Timeout) => true,
            AppError::Infra(InfraError::Database { .. }) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_collects_source_chain() {
        let err = AppError::from(ToggleError::Partial {
            post_id: "post-1".to_string(),
            source: CacheError::unavailable("redis", "broken pipe"),
        });
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &err);
        assert_eq!(report.messages.len(), 2);
        assert!(report.messages[1].contains("broken pipe"));
    }

    #[test]
    fn cache_outages_are_retryable() {
        assert!(AppError::from(CacheError::Timeout {
            op: "hget",
            timeout_ms: 250
        })
        .is_retryable());
        assert!(!AppError::from(DomainError::not_found("post")).is_retryable());
    }
}
