//! Conversions from application views to wire types.

use likefeed_api_types::{AuthorResponse, LikeToggleResponse, PostResponse};
use time::OffsetDateTime;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::application::feed::PostView;
use crate::domain::engagement::EngagementView;
use crate::domain::entities::{AuthoredPost, UserRecord};

const CREATED_AT_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second] [day].[month].[year]");

pub fn format_created_at(value: OffsetDateTime) -> String {
    value
        .format(CREATED_AT_FORMAT)
        .unwrap_or_else(|_| value.unix_timestamp().to_string())
}

fn author_to_api(author: UserRecord) -> AuthorResponse {
    AuthorResponse {
        id: author.id,
        nickname: author.nickname,
        photo_url: author.photo_url,
    }
}

pub fn authored_post_to_api(
    authored: AuthoredPost,
    engagement: Option<EngagementView>,
) -> PostResponse {
    let AuthoredPost { post, author } = authored;
    PostResponse {
        id: post.id,
        author: author_to_api(author),
        body: post.body,
        created_at: format_created_at(post.created_at),
        likes_count: engagement.as_ref().map(|view| view.like_count),
        is_liked: engagement.map(|view| view.is_liked_by_viewer),
    }
}

pub fn post_view_to_api(view: PostView) -> PostResponse {
    authored_post_to_api(view.post, view.engagement)
}

pub fn engagement_to_api(view: EngagementView) -> LikeToggleResponse {
    LikeToggleResponse {
        post_id: view.post_id,
        likes_count: view.like_count,
        is_liked: view.is_liked_by_viewer,
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn created_at_uses_clock_then_date() {
        assert_eq!(
            format_created_at(datetime!(2025-03-26 16:11:00 UTC)),
            "16:11:00 26.03.2025"
        );
        assert_eq!(
            format_created_at(datetime!(2024-09-03 20:31:05 UTC)),
            "20:31:05 03.09.2024"
        );
    }
}
