//! Engagement decoration of a listed page.

use futures::future::try_join_all;
use metrics::counter;
use tracing::{debug, warn};

use super::METRIC_CACHE_MALFORMED;
use super::backend::CacheError;
use super::engagement::{EngagementCache, Lookup};
use super::lazy::LazyInitializer;
use crate::domain::engagement::{EngagementView, ViewerId};
use crate::domain::entities::PostIdentity;

#[derive(Clone)]
pub struct BatchFetcher {
    cache: EngagementCache,
    lazy: LazyInitializer,
}

impl BatchFetcher {
    pub fn new(cache: EngagementCache, lazy: LazyInitializer) -> Self {
        Self { cache, lazy }
    }

    /// Decorate `posts` with the viewer's engagement, in input order.
    ///
    /// All 2N reads travel in one pipelined batch. Posts without a usable
    /// aggregate are then settled concurrently. Any backend error fails the
    /// whole page.
    pub async fn decorate<P>(
        &self,
        posts: &[P],
        viewer: &ViewerId,
    ) -> Result<Vec<EngagementView>, CacheError>
    where
        P: PostIdentity + Sync,
    {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = posts.iter().map(PostIdentity::post_id).collect();
        let page = self.cache.read_page(&ids, viewer.as_str()).await?;

        let mut counts: Vec<Option<u64>> = Vec::with_capacity(ids.len());
        let mut flags: Vec<bool> = Vec::with_capacity(ids.len());
        let mut pending = Vec::new();

        for (index, (count, flag)) in page.into_iter().enumerate() {
            let post_id = ids[index];
            flags.push(match flag {
                Lookup::Found(liked) => liked,
                Lookup::Missing => false,
                Lookup::Malformed(raw) => {
                    warn!(
                        post_id,
                        viewer = %viewer,
                        raw = %raw,
                        "Ignoring malformed like flag"
                    );
                    counter!(METRIC_CACHE_MALFORMED, "field" => "flag").increment(1);
                    false
                }
            });
            match count {
                Lookup::Found(value) => counts.push(Some(value)),
                unresolved => {
                    counts.push(None);
                    pending.push((index, unresolved));
                }
            }
        }

        if !pending.is_empty() {
            debug!(
                posts = ids.len(),
                unseeded = pending.len(),
                "seeding cold aggregates"
            );
            let lazy = &self.lazy;
            let ids = &ids;
            let settled = try_join_all(pending.into_iter().map(|(index, lookup)| async move {
                let count = lazy.settle(ids[index], lookup).await?;
                Ok::<_, CacheError>((index, count))
            }))
            .await?;
            for (index, count) in settled {
                counts[index] = Some(count);
            }
        }

        Ok(ids
            .iter()
            .zip(counts)
            .zip(flags)
            .map(|((post_id, count), liked)| {
                EngagementView::new(*post_id, count.unwrap_or_default(), liked)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::cache::{MemoryBackend, RetryPolicy, likes_key};

    fn fetcher(backend: Arc<MemoryBackend>) -> BatchFetcher {
        let cache = EngagementCache::new(backend, Duration::from_millis(250), RetryPolicy::none());
        BatchFetcher::new(cache.clone(), LazyInitializer::new(cache))
    }

    fn viewer(id: &str) -> ViewerId {
        ViewerId::parse(id).expect("valid viewer")
    }

    #[tokio::test]
    async fn empty_page_makes_no_calls() {
        let posts: Vec<String> = Vec::new();
        let views = fetcher(Arc::new(MemoryBackend::new()))
            .decorate(&posts, &viewer("user-1"))
            .await
            .expect("decorate");
        assert!(views.is_empty());
    }

    #[tokio::test]
    async fn malformed_flag_reads_as_not_liked() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_raw(&likes_key("post-1"), "total-likes", "2");
        backend.put_raw(&likes_key("post-1"), "user-1", "maybe");

        let views = fetcher(backend)
            .decorate(&["post-1"], &viewer("user-1"))
            .await
            .expect("decorate");

        assert_eq!(views, vec![EngagementView::new("post-1", 2, false)]);
    }

    #[tokio::test]
    async fn malformed_aggregate_is_reseeded() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_raw(&likes_key("post-1"), "total-likes", "NaN");

        let views = fetcher(Arc::clone(&backend))
            .decorate(&["post-1"], &viewer("user-1"))
            .await
            .expect("decorate");

        assert_eq!(views, vec![EngagementView::empty("post-1")]);
        assert_eq!(
            backend.raw_field(&likes_key("post-1"), "total-likes"),
            Some("0".to_string())
        );
    }
}
