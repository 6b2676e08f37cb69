//! Cache configuration.
//!
//! Controls timeouts, retries and the toggle strategy via the `[cache]` section.

use std::time::Duration;

use serde::Deserialize;

use super::retry::RetryPolicy;

// Default values for cache configuration
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 250;
const DEFAULT_RETRY_ATTEMPTS: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 20;

/// How a toggle closes the same-user double-count race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleStrategy {
    /// Backend-side atomic script when available, keyed lock otherwise.
    #[default]
    Auto,
    /// Always serialize toggles of one `(post, user)` pair in-process.
    KeyedLock,
}

impl ToggleStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::KeyedLock => "keyed_lock",
        }
    }
}

impl std::str::FromStr for ToggleStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "keyed_lock" | "keyed-lock" => Ok(Self::KeyedLock),
            other => Err(format!("expected `auto` or `keyed_lock`, got `{other}`")),
        }
    }
}

/// Runtime knobs of the engagement cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound for a single backend call.
    pub operation_timeout_ms: u64,
    /// Extra attempts for idempotent operations.
    pub retry_attempts: u32,
    /// Backoff before the first retry; doubles on each further attempt.
    pub retry_backoff_ms: u64,
    pub toggle_strategy: ToggleStrategy,
    /// Serve listings without engagement when the backend is down.
    pub degrade_on_unavailable: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            toggle_strategy: ToggleStrategy::Auto,
            degrade_on_unavailable: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            operation_timeout_ms: settings.operation_timeout_ms.get(),
            retry_attempts: settings.retry_attempts,
            retry_backoff_ms: settings.retry_backoff_ms,
            toggle_strategy: settings.toggle_strategy,
            degrade_on_unavailable: settings.degrade_on_unavailable,
        }
    }
}

impl CacheConfig {
    /// Returns the per-call timeout, clamping to 1ms if zero.
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }
}
