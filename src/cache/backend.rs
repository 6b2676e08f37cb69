//! Key-value backend abstraction.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache backend `{backend}` unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },
    #[error("cache operation `{op}` timed out after {timeout_ms}ms")]
    Timeout { op: &'static str, timeout_ms: u64 },
    #[error("cache backend `{backend}` rejected `{op}`: {message}")]
    Rejected {
        backend: &'static str,
        op: &'static str,
        message: String,
    },
}

impl CacheError {
    pub fn unavailable(backend: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            backend,
            message: message.into(),
        }
    }

    pub fn rejected(backend: &'static str, op: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            backend,
            op,
            message: message.into(),
        }
    }

    /// Connectivity failures and timeouts may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// One `(hash key, field)` address inside a pipelined read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRef<'a> {
    pub key: &'a str,
    pub field: &'a str,
}

impl<'a> FieldRef<'a> {
    pub fn new(key: &'a str, field: &'a str) -> Self {
        Self { key, field }
    }
}

/// Outcome of a backend-side atomic toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleReply {
    pub liked: bool,
    pub count: u64,
}

/// Hash primitives the engagement cache needs from a key-value store.
///
/// Implementations are shared handles (`Arc<dyn KvBackend>`) and must be safe
/// to call concurrently.
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Short label used in errors, logs and metrics.
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError>;

    /// Read many fields in one round trip. The reply matches `fields` index by index.
    async fn hget_many(&self, fields: &[FieldRef<'_>]) -> Result<Vec<Option<String>>, CacheError>;

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;

    /// Set only when the field is absent. Returns whether the write happened.
    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError>;

    async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError>;

    /// Atomically add `delta` and return the new value. A missing field counts as 0.
    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError>;

    /// Flip `user_field` and adjust `aggregate_field` as one atomic unit.
    ///
    /// Returns `Ok(None)` when the backend has no such primitive; callers then
    /// serialize the toggle themselves.
    async fn toggle_flag(
        &self,
        _key: &str,
        _user_field: &str,
        _aggregate_field: &str,
    ) -> Result<Option<ToggleReply>, CacheError> {
        Ok(None)
    }
}
