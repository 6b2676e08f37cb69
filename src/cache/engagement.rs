//! Primitive engagement operations over one hash per post.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use metrics::histogram;

use super::METRIC_CACHE_OP_MS;
use super::backend::{CacheError, FieldRef, KvBackend, ToggleReply};
use super::keys::{AGGREGATE_FIELD, FLAG_LIKED, likes_key, parse_count, parse_flag};
use super::retry::RetryPolicy;

/// Result of reading one cache field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Missing,
    /// The stored text did not parse; carries the raw value for logging.
    Malformed(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing | Self::Malformed(_) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Aggregate and viewer flag of one post, as read in a batch.
pub type PairLookup = (Lookup<u64>, Lookup<bool>);

/// Owns the key scheme and the bounded calls into the backend.
#[derive(Clone)]
pub struct EngagementCache {
    backend: Arc<dyn KvBackend>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl EngagementCache {
    pub fn new(backend: Arc<dyn KvBackend>, timeout: Duration, retry: RetryPolicy) -> Self {
        Self {
            backend,
            timeout,
            retry,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    async fn timed<T, Fut>(&self, op: &'static str, fut: Fut) -> Result<T, CacheError>
    where
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let started = Instant::now();
        let outcome = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout {
                op,
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };
        histogram!(METRIC_CACHE_OP_MS, "op" => op)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        outcome
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.timed("ping", self.backend.ping()).await
    }

    pub async fn get_aggregate(&self, post_id: &str) -> Result<Lookup<u64>, CacheError> {
        let key = likes_key(post_id);
        let raw = self
            .retry
            .run("hget", || {
                self.timed("hget", self.backend.hget(&key, AGGREGATE_FIELD))
            })
            .await?;
        Ok(parse_count(raw))
    }

    /// Idempotent overwrite.
    pub async fn set_aggregate(&self, post_id: &str, value: u64) -> Result<(), CacheError> {
        let key = likes_key(post_id);
        let value = value.to_string();
        self.retry
            .run("hset", || {
                self.timed("hset", self.backend.hset(&key, AGGREGATE_FIELD, &value))
            })
            .await
    }

    /// Write `value` only when no aggregate exists. Returns whether it was written.
    pub async fn seed_aggregate(&self, post_id: &str, value: u64) -> Result<bool, CacheError> {
        let key = likes_key(post_id);
        let value = value.to_string();
        self.retry
            .run("hset_nx", || {
                self.timed(
                    "hset_nx",
                    self.backend.hset_nx(&key, AGGREGATE_FIELD, &value),
                )
            })
            .await
    }

    pub async fn get_user_flag(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Lookup<bool>, CacheError> {
        let key = likes_key(post_id);
        let raw = self
            .retry
            .run("hget", || self.timed("hget", self.backend.hget(&key, user_id)))
            .await?;
        Ok(parse_flag(raw))
    }

    /// `false` is never stored: it clears the field instead.
    pub async fn set_user_flag(
        &self,
        post_id: &str,
        user_id: &str,
        liked: bool,
    ) -> Result<(), CacheError> {
        if !liked {
            return self.clear_user_flag(post_id, user_id).await;
        }
        let key = likes_key(post_id);
        self.retry
            .run("hset", || {
                self.timed("hset", self.backend.hset(&key, user_id, FLAG_LIKED))
            })
            .await
    }

    pub async fn clear_user_flag(&self, post_id: &str, user_id: &str) -> Result<(), CacheError> {
        let key = likes_key(post_id);
        self.retry
            .run("hdel", || self.timed("hdel", self.backend.hdel(&key, user_id)))
            .await
    }

    /// Atomic at the backend. Not retried: a lost reply would double-apply.
    pub async fn increment_aggregate(&self, post_id: &str, delta: i64) -> Result<i64, CacheError> {
        let key = likes_key(post_id);
        self.timed("hincr", self.backend.hincr(&key, AGGREGATE_FIELD, delta))
            .await
    }

    /// Read the aggregate and the viewer flag of every post in one round trip.
    ///
    /// The reply has one entry per id, in input order.
    pub async fn read_page<S>(
        &self,
        post_ids: &[S],
        user_id: &str,
    ) -> Result<Vec<PairLookup>, CacheError>
    where
        S: AsRef<str> + Sync,
    {
        if post_ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = post_ids.iter().map(|id| likes_key(id.as_ref())).collect();
        let fields: Vec<FieldRef<'_>> = keys
            .iter()
            .flat_map(|key| [FieldRef::new(key, AGGREGATE_FIELD), FieldRef::new(key, user_id)])
            .collect();

        let raw = self
            .retry
            .run("hget_many", || {
                self.timed("hget_many", self.backend.hget_many(&fields))
            })
            .await?;

        if raw.len() != fields.len() {
            return Err(CacheError::rejected(
                self.backend.name(),
                "hget_many",
                format!("expected {} replies, got {}", fields.len(), raw.len()),
            ));
        }

        let mut replies = raw.into_iter();
        let mut out = Vec::with_capacity(post_ids.len());
        while let (Some(count), Some(flag)) = (replies.next(), replies.next()) {
            out.push((parse_count(count), parse_flag(flag)));
        }
        Ok(out)
    }

    /// Aggregate and flag of a single pair in one round trip.
    pub async fn read_pair(&self, post_id: &str, user_id: &str) -> Result<PairLookup, CacheError> {
        let mut page = self.read_page(&[post_id], user_id).await?;
        page.pop().ok_or_else(|| {
            CacheError::rejected(self.backend.name(), "hget_many", "empty pipeline reply")
        })
    }

    /// Backend-side atomic toggle, when the backend has one. Not retried.
    pub async fn atomic_toggle(
        &self,
        post_id: &str,
        user_id: &str,
    ) -> Result<Option<ToggleReply>, CacheError> {
        let key = likes_key(post_id);
        self.timed(
            "toggle_flag",
            self.backend.toggle_flag(&key, user_id, AGGREGATE_FIELD),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryBackend;

    fn cache_over(backend: Arc<MemoryBackend>) -> EngagementCache {
        EngagementCache::new(backend, Duration::from_millis(250), RetryPolicy::none())
    }

    #[tokio::test]
    async fn false_flag_is_never_stored() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache_over(Arc::clone(&backend));

        cache
            .set_user_flag("post-1", "user-1", true)
            .await
            .expect("set flag");
        assert_eq!(
            cache.get_user_flag("post-1", "user-1").await.expect("read"),
            Lookup::Found(true)
        );

        cache
            .set_user_flag("post-1", "user-1", false)
            .await
            .expect("clear flag");
        assert_eq!(
            backend.raw_field(&likes_key("post-1"), "user-1"),
            None,
            "false must clear the field"
        );
    }

    #[tokio::test]
    async fn read_page_keeps_input_order() {
        let backend = Arc::new(MemoryBackend::new());
        let cache = cache_over(backend);
        cache.set_aggregate("b", 5).await.expect("seed b");
        cache.set_user_flag("b", "viewer", true).await.expect("flag b");
        cache.set_aggregate("c", 2).await.expect("seed c");

        let page = cache
            .read_page(&["a", "b", "c"], "viewer")
            .await
            .expect("read page");

        assert_eq!(
            page,
            vec![
                (Lookup::Missing, Lookup::Missing),
                (Lookup::Found(5), Lookup::Found(true)),
                (Lookup::Found(2), Lookup::Missing),
            ]
        );
    }

    #[tokio::test]
    async fn seed_does_not_clobber() {
        let cache = cache_over(Arc::new(MemoryBackend::new()));
        assert!(cache.seed_aggregate("post-1", 0).await.expect("first seed"));
        cache.increment_aggregate("post-1", 1).await.expect("incr");
        assert!(!cache.seed_aggregate("post-1", 0).await.expect("second seed"));
        assert_eq!(
            cache.get_aggregate("post-1").await.expect("read"),
            Lookup::Found(1)
        );
    }
}
