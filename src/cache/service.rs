//! Entry point exposed to the application layer.

use std::sync::Arc;

use super::backend::{CacheError, KvBackend};
use super::batch::BatchFetcher;
use super::config::CacheConfig;
use super::engagement::EngagementCache;
use super::lazy::LazyInitializer;
use super::toggle::{ToggleEngine, ToggleError};
use crate::domain::engagement::{EngagementView, ViewerId};
use crate::domain::entities::PostIdentity;

/// Bundles the read and write paths over one shared backend handle.
#[derive(Clone)]
pub struct EngagementService {
    cache: EngagementCache,
    fetcher: BatchFetcher,
    toggles: ToggleEngine,
    degrade_on_unavailable: bool,
}

impl EngagementService {
    pub fn new(backend: Arc<dyn KvBackend>, config: &CacheConfig) -> Self {
        let cache = EngagementCache::new(
            backend,
            config.operation_timeout(),
            config.retry_policy(),
        );
        let lazy = LazyInitializer::new(cache.clone());
        Self {
            fetcher: BatchFetcher::new(cache.clone(), lazy),
            toggles: ToggleEngine::new(cache.clone(), config.toggle_strategy),
            cache,
            degrade_on_unavailable: config.degrade_on_unavailable,
        }
    }

    pub async fn decorate_page<P>(
        &self,
        posts: &[P],
        viewer: &ViewerId,
    ) -> Result<Vec<EngagementView>, CacheError>
    where
        P: PostIdentity + Sync,
    {
        self.fetcher.decorate(posts, viewer).await
    }

    pub async fn toggle(
        &self,
        post_id: &str,
        viewer: &ViewerId,
    ) -> Result<EngagementView, ToggleError> {
        self.toggles.toggle(post_id, viewer).await
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        self.cache.ping().await
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    /// Whether listings should drop engagement instead of failing.
    pub fn degrades_on_unavailable(&self) -> bool {
        self.degrade_on_unavailable
    }

    /// Low-level access for tooling and tests.
    pub fn cache(&self) -> &EngagementCache {
        &self.cache
    }
}
