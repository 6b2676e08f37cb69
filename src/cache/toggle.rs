//! Like toggle state machine.
//!
//! The only writer of per-user flags. Each call flips one `(post, user)` pair
//! and moves the aggregate by one in the same direction.

use metrics::counter;
use thiserror::Error;
use tracing::{error, warn};

use super::backend::CacheError;
use super::config::ToggleStrategy;
use super::engagement::{EngagementCache, Lookup};
use super::lock::PairLocks;
use super::{METRIC_TOGGLE, METRIC_TOGGLE_PARTIAL};
use crate::domain::engagement::{EngagementView, LikeState, ViewerId};

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The flag was written but the aggregate was not adjusted.
    #[error("like toggle on post `{post_id}` stopped after the flag write")]
    Partial {
        post_id: String,
        #[source]
        source: CacheError,
    },
    #[error("like toggle task aborted: {0}")]
    Aborted(String),
}

impl ToggleError {
    /// The cache error behind this failure, if any.
    pub fn cache_error(&self) -> Option<&CacheError> {
        match self {
            Self::Cache(err) | Self::Partial { source: err, .. } => Some(err),
            Self::Aborted(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct ToggleEngine {
    cache: EngagementCache,
    locks: PairLocks,
    strategy: ToggleStrategy,
}

impl ToggleEngine {
    pub fn new(cache: EngagementCache, strategy: ToggleStrategy) -> Self {
        Self {
            cache,
            locks: PairLocks::new(),
            strategy,
        }
    }

    /// Flip the viewer's like on `post_id` and return the resulting engagement.
    pub async fn toggle(
        &self,
        post_id: &str,
        viewer: &ViewerId,
    ) -> Result<EngagementView, ToggleError> {
        if self.strategy == ToggleStrategy::Auto
            && let Some(reply) = self.cache.atomic_toggle(post_id, viewer.as_str()).await?
        {
            counter!(METRIC_TOGGLE, "strategy" => "script").increment(1);
            return Ok(EngagementView::new(post_id, reply.count, reply.liked));
        }

        let view = self.toggle_locked(post_id, viewer).await?;
        counter!(METRIC_TOGGLE, "strategy" => "keyed_lock").increment(1);
        Ok(view)
    }

    async fn toggle_locked(
        &self,
        post_id: &str,
        viewer: &ViewerId,
    ) -> Result<EngagementView, ToggleError> {
        let guard = self.locks.acquire(post_id, viewer.as_str()).await;
        let (count, flag) = self.cache.read_pair(post_id, viewer.as_str()).await?;

        let current = match flag {
            Lookup::Found(liked) => LikeState::from_flag(liked),
            Lookup::Missing => LikeState::NotLiked,
            Lookup::Malformed(raw) => {
                warn!(
                    post_id,
                    viewer = %viewer,
                    raw = %raw,
                    "Treating malformed like flag as not liked"
                );
                LikeState::NotLiked
            }
        };
        let target = current.toggled();

        // Writes run detached so a dropped caller cannot separate them.
        let cache = self.cache.clone();
        let post = post_id.to_string();
        let user = viewer.as_str().to_string();
        let task = tokio::spawn(async move {
            let _guard = guard;
            apply_transition(&cache, &post, &user, target, count).await
        });

        match task.await {
            Ok(result) => result,
            Err(join) => Err(ToggleError::Aborted(join.to_string())),
        }
    }
}

async fn apply_transition(
    cache: &EngagementCache,
    post_id: &str,
    user_id: &str,
    target: LikeState,
    observed: Lookup<u64>,
) -> Result<EngagementView, ToggleError> {
    cache
        .set_user_flag(post_id, user_id, target.is_liked())
        .await?;

    match adjust_aggregate(cache, post_id, target, observed).await {
        Ok(count) => Ok(EngagementView::new(post_id, count, target.is_liked())),
        Err(source) => {
            counter!(METRIC_TOGGLE_PARTIAL).increment(1);
            error!(
                post_id,
                user_id,
                liked = target.is_liked(),
                error = %source,
                "Like flag written but aggregate not adjusted"
            );
            Err(ToggleError::Partial {
                post_id: post_id.to_string(),
                source,
            })
        }
    }
}

async fn adjust_aggregate(
    cache: &EngagementCache,
    post_id: &str,
    target: LikeState,
    observed: Lookup<u64>,
) -> Result<u64, CacheError> {
    if let Lookup::Malformed(raw) = observed {
        warn!(
            post_id,
            raw = %raw,
            "Replacing malformed like aggregate during toggle"
        );
        let count = target.cold_count();
        cache.set_aggregate(post_id, count).await?;
        return Ok(count);
    }

    // A missing aggregate counts as zero at the backend, which lands on the
    // cold expected value.
    let next = cache
        .increment_aggregate(post_id, target.entry_delta())
        .await?;
    if next >= 0 {
        return Ok(next as u64);
    }

    // Drift left the aggregate below zero. Undo the overshoot with another
    // increment so concurrent likes from other users survive the clamp.
    let repaired = cache.increment_aggregate(post_id, -next).await?;
    Ok(repaired.max(0) as u64)
}
