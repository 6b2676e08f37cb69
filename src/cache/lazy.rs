//! Lazy seeding of missing aggregates.

use metrics::counter;
use tracing::{debug, warn};

use super::backend::CacheError;
use super::engagement::{EngagementCache, Lookup};
use super::{METRIC_CACHE_MALFORMED, METRIC_CACHE_SEEDED};

/// Seeds an aggregate to zero the first time a reader finds none.
///
/// Never consults the relational store: a rebuilt cache starts every post at
/// zero regardless of past likes.
#[derive(Clone)]
pub struct LazyInitializer {
    cache: EngagementCache,
}

impl LazyInitializer {
    pub fn new(cache: EngagementCache) -> Self {
        Self { cache }
    }

    /// Returns the aggregate of `post_id`, seeding it when absent.
    pub async fn ensure_aggregate(&self, post_id: &str) -> Result<u64, CacheError> {
        let observed = self.cache.get_aggregate(post_id).await?;
        self.settle(post_id, observed).await
    }

    /// Resolve an already-read aggregate to a usable count.
    ///
    /// A missing value is seeded with a conditional write; when another writer
    /// got there first its value is re-read and returned. A malformed value is
    /// overwritten with zero.
    pub async fn settle(&self, post_id: &str, observed: Lookup<u64>) -> Result<u64, CacheError> {
        match observed {
            Lookup::Found(count) => Ok(count),
            Lookup::Missing => self.seed(post_id).await,
            Lookup::Malformed(raw) => {
                warn!(
                    post_id,
                    raw = %raw,
                    "Overwriting malformed like aggregate with 0"
                );
                counter!(METRIC_CACHE_MALFORMED, "field" => "aggregate").increment(1);
                self.cache.set_aggregate(post_id, 0).await?;
                Ok(0)
            }
        }
    }

    async fn seed(&self, post_id: &str) -> Result<u64, CacheError> {
        if self.cache.seed_aggregate(post_id, 0).await? {
            debug!(post_id, "seeded like aggregate");
            counter!(METRIC_CACHE_SEEDED).increment(1);
            return Ok(0);
        }

        match self.cache.get_aggregate(post_id).await? {
            Lookup::Found(count) => Ok(count),
            // Evicted again between the two calls; zero is what a reseed would write.
            Lookup::Missing => Ok(0),
            Lookup::Malformed(raw) => {
                warn!(
                    post_id,
                    raw = %raw,
                    "Concurrent writer left malformed like aggregate; overwriting with 0"
                );
                counter!(METRIC_CACHE_MALFORMED, "field" => "aggregate").increment(1);
                self.cache.set_aggregate(post_id, 0).await?;
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::{MemoryBackend, RetryPolicy, likes_key};

    fn setup() -> (Arc<MemoryBackend>, EngagementCache, LazyInitializer) {
        let backend = Arc::new(MemoryBackend::new());
        let cache = EngagementCache::new(
            backend.clone(),
            Duration::from_millis(250),
            RetryPolicy::none(),
        );
        let lazy = LazyInitializer::new(cache.clone());
        (backend, cache, lazy)
    }

    #[tokio::test]
    async fn cold_post_is_seeded_to_zero() {
        let (backend, _, lazy) = setup();
        assert_eq!(lazy.ensure_aggregate("post-1").await.expect("ensure"), 0);
        assert_eq!(
            backend.raw_field(&likes_key("post-1"), "total-likes"),
            Some("0".to_string())
        );
    }

    #[tokio::test]
    async fn existing_count_is_kept() {
        let (_, cache, lazy) = setup();
        cache.set_aggregate("post-1", 3).await.expect("set");
        assert_eq!(lazy.ensure_aggregate("post-1").await.expect("ensure"), 3);
    }

    #[tokio::test]
    async fn lost_seed_race_returns_winner_value() {
        let (_, cache, lazy) = setup();
        // A toggle lands between our read and our conditional write.
        let observed = cache.get_aggregate("post-1").await.expect("read");
        assert_eq!(observed, Lookup::Missing);
        cache.increment_aggregate("post-1", 1).await.expect("incr");

        assert_eq!(lazy.settle("post-1", observed).await.expect("settle"), 1);
    }

    #[tokio::test]
    async fn malformed_count_is_reset() {
        let (backend, _, lazy) = setup();
        backend.put_raw(&likes_key("post-1"), "total-likes", "-4");
        assert_eq!(lazy.ensure_aggregate("post-1").await.expect("ensure"), 0);
        assert_eq!(
            backend.raw_field(&likes_key("post-1"), "total-likes"),
            Some("0".to_string())
        );
    }
}
