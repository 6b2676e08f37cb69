use time::OffsetDateTime;

use crate::domain::entities::{AuthoredPost, PostRecord, UserRecord};

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: String,
    pub(crate) author_id: String,
    pub(crate) body: String,
    pub(crate) created_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

/// A post joined with its author in a single row.
#[derive(sqlx::FromRow)]
pub(crate) struct AuthoredPostRow {
    pub(crate) id: String,
    pub(crate) author_id: String,
    pub(crate) body: String,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) nickname: String,
    pub(crate) photo_url: String,
}

impl From<AuthoredPostRow> for AuthoredPost {
    fn from(row: AuthoredPostRow) -> Self {
        Self {
            author: UserRecord {
                id: row.author_id.clone(),
                nickname: row.nickname,
                photo_url: row.photo_url,
            },
            post: PostRecord {
                id: row.id,
                author_id: row.author_id,
                body: row.body,
                created_at: row.created_at,
            },
        }
    }
}
