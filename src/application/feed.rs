//! Feed use cases: listing, authoring and liking posts.

use std::sync::Arc;

use metrics::{counter, histogram};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::repos::{
    CreatePostParams, PageRequest, PostsRepo, PostsWriteRepo, UpdatePostParams, UsersRepo,
};
use crate::cache::EngagementService;
use crate::domain::engagement::{EngagementView, ViewerId};
use crate::domain::entities::AuthoredPost;
use crate::domain::error::DomainError;

const METRIC_FEED_DEGRADED: &str = "likefeed_feed_degraded_total";
const METRIC_PAGE_LIMIT: &str = "likefeed_page_limit";
const METRIC_PAGE_OFFSET: &str = "likefeed_page_offset";

const MAX_BODY_CHARS: usize = 4096;

/// A post with the viewer's engagement. `None` when the listing was degraded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostView {
    pub post: AuthoredPost,
    pub engagement: Option<EngagementView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub posts: Vec<PostView>,
    pub engagement_degraded: bool,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    users: Arc<dyn UsersRepo>,
    engagement: EngagementService,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        users: Arc<dyn UsersRepo>,
        engagement: EngagementService,
    ) -> Self {
        Self {
            posts,
            writer,
            users,
            engagement,
        }
    }

    pub fn engagement(&self) -> &EngagementService {
        &self.engagement
    }

    pub async fn list_posts(
        &self,
        viewer: &ViewerId,
        page: PageRequest,
    ) -> Result<FeedPage, AppError> {
        histogram!(METRIC_PAGE_LIMIT).record(f64::from(page.limit));
        histogram!(METRIC_PAGE_OFFSET).record(f64::from(page.offset));

        let posts = self.posts.list_posts(page).await?;

        match self.engagement.decorate_page(&posts, viewer).await {
            Ok(views) => Ok(FeedPage {
                posts: posts
                    .into_iter()
                    .zip(views)
                    .map(|(post, view)| PostView {
                        post,
                        engagement: Some(view),
                    })
                    .collect(),
                engagement_degraded: false,
            }),
            Err(err) if self.engagement.degrades_on_unavailable() && err.is_retryable() => {
                warn!(
                    viewer = %viewer,
                    posts = posts.len(),
                    error = %err,
                    "Serving feed without engagement"
                );
                counter!(METRIC_FEED_DEGRADED).increment(1);
                Ok(FeedPage {
                    posts: posts
                        .into_iter()
                        .map(|post| PostView {
                            post,
                            engagement: None,
                        })
                        .collect(),
                    engagement_degraded: true,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn create_post(&self, viewer: &ViewerId, body: &str) -> Result<PostView, AppError> {
        let body = validate_body(body)?;
        let author = self
            .users
            .find_user(viewer.as_str())
            .await?
            .ok_or_else(|| DomainError::not_found("user"))?;

        let record = self
            .writer
            .create_post(CreatePostParams {
                id: format!("post-{}", Uuid::new_v4()),
                author_id: author.id.clone(),
                body,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(post_id = %record.id, author_id = %author.id, "post created");

        let engagement = EngagementView::empty(record.id.clone());
        Ok(PostView {
            post: AuthoredPost {
                post: record,
                author,
            },
            engagement: Some(engagement),
        })
    }

    pub async fn update_post(
        &self,
        viewer: &ViewerId,
        post_id: &str,
        body: &str,
    ) -> Result<AuthoredPost, AppError> {
        let body = validate_body(body)?;
        let existing = self.authored_by_viewer(viewer, post_id, "update").await?;

        let record = self
            .writer
            .update_post(UpdatePostParams {
                id: existing.post.id.clone(),
                body,
                created_at: OffsetDateTime::now_utc(),
            })
            .await?;

        info!(post_id, "post updated");
        Ok(AuthoredPost {
            post: record,
            author: existing.author,
        })
    }

    /// Removes the post. Its engagement entry is left in the cache.
    pub async fn delete_post(&self, viewer: &ViewerId, post_id: &str) -> Result<(), AppError> {
        self.authored_by_viewer(viewer, post_id, "delete").await?;
        self.writer.delete_post(post_id).await?;
        info!(post_id, "post deleted");
        Ok(())
    }

    pub async fn toggle_like(
        &self,
        viewer: &ViewerId,
        post_id: &str,
    ) -> Result<EngagementView, AppError> {
        if self.posts.find_post(post_id).await?.is_none() {
            return Err(DomainError::not_found("post").into());
        }
        Ok(self.engagement.toggle(post_id, viewer).await?)
    }

    async fn authored_by_viewer(
        &self,
        viewer: &ViewerId,
        post_id: &str,
        action: &str,
    ) -> Result<AuthoredPost, AppError> {
        let post = self
            .posts
            .find_post(post_id)
            .await?
            .ok_or_else(|| DomainError::not_found("post"))?;
        if !post.is_authored_by(viewer.as_str()) {
            return Err(DomainError::permission(format!("only author can {action} the post")).into());
        }
        Ok(post)
    }
}

fn validate_body(body: &str) -> Result<String, DomainError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("post body must not be empty"));
    }
    if trimmed.chars().count() > MAX_BODY_CHARS {
        return Err(DomainError::validation(format!(
            "post body exceeds {MAX_BODY_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_is_trimmed_and_required() {
        assert_eq!(validate_body("  hi ").expect("valid"), "hi");
        assert!(matches!(
            validate_body(" \n "),
            Err(DomainError::Validation { .. })
        ));
        assert!(validate_body(&"x".repeat(MAX_BODY_CHARS + 1)).is_err());
    }
}
