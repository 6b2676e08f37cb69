//! In-process stand-ins for the relational store and cache backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use likefeed::application::feed::FeedService;
use likefeed::application::repos::{
    CreatePostParams, HealthRepo, PageRequest, PostsRepo, PostsWriteRepo, RepoError,
    UpdatePostParams, UsersRepo,
};
use likefeed::cache::{
    CacheConfig, CacheError, EngagementService, FieldRef, KvBackend, MemoryBackend, ToggleReply,
    ToggleStrategy, parse_count, parse_flag,
};
use likefeed::domain::entities::{AuthoredPost, PostRecord, UserRecord};
use likefeed::infra::db::seed::{default_posts, default_users};
use likefeed::infra::http::ApiState;
use tokio::sync::{Mutex, RwLock};

/// Posts and users held in memory, seeded with the default data set.
pub struct MemoryStore {
    users: HashMap<String, UserRecord>,
    posts: RwLock<Vec<PostRecord>>,
}

impl MemoryStore {
    pub fn seeded() -> Self {
        Self {
            users: default_users()
                .into_iter()
                .map(|user| (user.id.clone(), user))
                .collect(),
            posts: RwLock::new(default_posts()),
        }
    }

    fn authored(&self, post: &PostRecord) -> Result<AuthoredPost, RepoError> {
        let author = self
            .users
            .get(&post.author_id)
            .cloned()
            .ok_or_else(|| RepoError::from_persistence("dangling author"))?;
        Ok(AuthoredPost {
            post: post.clone(),
            author,
        })
    }
}

#[async_trait]
impl PostsRepo for MemoryStore {
    async fn list_posts(&self, page: PageRequest) -> Result<Vec<AuthoredPost>, RepoError> {
        let mut posts = self.posts.read().await.clone();
        posts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        posts
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .map(|post| self.authored(post))
            .collect()
    }

    async fn find_post(&self, id: &str) -> Result<Option<AuthoredPost>, RepoError> {
        let posts = self.posts.read().await;
        posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| self.authored(post))
            .transpose()
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryStore {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let record = PostRecord {
            id: params.id,
            author_id: params.author_id,
            body: params.body,
            created_at: params.created_at,
        };
        self.posts.write().await.push(record.clone());
        Ok(record)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostRecord, RepoError> {
        let mut posts = self.posts.write().await;
        let post = posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        post.body = params.body;
        post.created_at = params.created_at;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: &str) -> Result<(), RepoError> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|post| post.id != id);
        if posts.len() == before {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl UsersRepo for MemoryStore {
    async fn find_user(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        Ok(self.users.get(id).cloned())
    }
}

#[async_trait]
impl HealthRepo for MemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

/// Wraps [`MemoryBackend`] with switchable failures and an optional
/// server-side toggle.
pub struct FlakyBackend {
    inner: Arc<MemoryBackend>,
    down: AtomicBool,
    fail_incr: AtomicBool,
    scripted: bool,
    script_lock: Mutex<()>,
}

impl FlakyBackend {
    pub fn new(inner: Arc<MemoryBackend>) -> Self {
        Self {
            inner,
            down: AtomicBool::new(false),
            fail_incr: AtomicBool::new(false),
            scripted: false,
            script_lock: Mutex::new(()),
        }
    }

    /// Same backend, but answering `toggle_flag` in one serialized step.
    pub fn scripted(inner: Arc<MemoryBackend>) -> Self {
        Self {
            scripted: true,
            ..Self::new(inner)
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub fn fail_increments(&self, fail: bool) {
        self.fail_incr.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable("flaky", "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for FlakyBackend {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.check()?;
        self.inner.ping().await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, CacheError> {
        self.check()?;
        self.inner.hget(key, field).await
    }

    async fn hget_many(&self, fields: &[FieldRef<'_>]) -> Result<Vec<Option<String>>, CacheError> {
        self.check()?;
        self.inner.hget_many(fields).await
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.hset(key, field, value).await
    }

    async fn hset_nx(&self, key: &str, field: &str, value: &str) -> Result<bool, CacheError> {
        self.check()?;
        self.inner.hset_nx(key, field, value).await
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<(), CacheError> {
        self.check()?;
        self.inner.hdel(key, field).await
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64, CacheError> {
        self.check()?;
        if self.fail_incr.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable("flaky", "connection reset"));
        }
        self.inner.hincr(key, field, delta).await
    }

    async fn toggle_flag(
        &self,
        key: &str,
        user_field: &str,
        aggregate_field: &str,
    ) -> Result<Option<ToggleReply>, CacheError> {
        self.check()?;
        if !self.scripted {
            return Ok(None);
        }
        let _serialized = self.script_lock.lock().await;
        let liked = parse_flag(self.inner.hget(key, user_field).await?)
            .found()
            .unwrap_or(false);
        let count = parse_count(self.inner.hget(key, aggregate_field).await?)
            .found()
            .unwrap_or(0);
        let count = if liked {
            self.inner.hdel(key, user_field).await?;
            count.saturating_sub(1)
        } else {
            self.inner.hset(key, user_field, "1").await?;
            count + 1
        };
        self.inner
            .hset(key, aggregate_field, &count.to_string())
            .await?;
        Ok(Some(ToggleReply {
            liked: !liked,
            count,
        }))
    }
}

pub fn cache_config(strategy: ToggleStrategy, degrade: bool) -> CacheConfig {
    CacheConfig {
        operation_timeout_ms: 1_000,
        retry_attempts: 1,
        retry_backoff_ms: 1,
        toggle_strategy: strategy,
        degrade_on_unavailable: degrade,
    }
}

pub fn engagement(backend: Arc<dyn KvBackend>, strategy: ToggleStrategy) -> EngagementService {
    EngagementService::new(backend, &cache_config(strategy, false))
}

pub fn feed_service(store: Arc<MemoryStore>, engagement: EngagementService) -> FeedService {
    FeedService::new(store.clone(), store.clone(), store, engagement)
}

pub fn api_state(store: Arc<MemoryStore>, engagement: EngagementService) -> ApiState {
    ApiState {
        feed: Arc::new(feed_service(store.clone(), engagement)),
        db: store,
    }
}
