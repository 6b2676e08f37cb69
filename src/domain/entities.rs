//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub nickname: String,
    pub photo_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: String,
    pub author_id: String,
    pub body: String,
    pub created_at: OffsetDateTime,
}

/// A post joined with its author, as returned by feed listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthoredPost {
    pub post: PostRecord,
    pub author: UserRecord,
}

impl AuthoredPost {
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.post.author_id == user_id
    }
}

/// Anything that can be decorated with engagement data.
pub trait PostIdentity {
    fn post_id(&self) -> &str;
}

impl PostIdentity for PostRecord {
    fn post_id(&self) -> &str {
        &self.id
    }
}

impl PostIdentity for AuthoredPost {
    fn post_id(&self) -> &str {
        &self.post.id
    }
}

impl PostIdentity for String {
    fn post_id(&self) -> &str {
        self
    }
}

impl PostIdentity for &str {
    fn post_id(&self) -> &str {
        self
    }
}
