//! Like engagement: the viewer identity, the per-pair like state machine and the
//! read-only projection handed to callers.

use std::fmt;

use serde::Serialize;

use super::error::DomainError;

/// Hash field holding the per-post aggregate. A user id may never collide with it.
pub const AGGREGATE_FIELD: &str = "total-likes";

const MAX_VIEWER_ID_LEN: usize = 128;

/// A validated, non-empty user id of the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ViewerId(String);

impl ViewerId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("viewer id must not be empty"));
        }
        if trimmed.len() > MAX_VIEWER_ID_LEN {
            return Err(DomainError::validation(format!(
                "viewer id exceeds {MAX_VIEWER_ID_LEN} bytes"
            )));
        }
        if trimmed == AGGREGATE_FIELD {
            return Err(DomainError::validation(format!(
                "viewer id `{AGGREGATE_FIELD}` is reserved"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ViewerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// State of one `(post, user)` pair. Absence of a stored flag is `NotLiked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeState {
    Liked,
    NotLiked,
}

impl LikeState {
    pub fn from_flag(liked: bool) -> Self {
        if liked { Self::Liked } else { Self::NotLiked }
    }

    pub fn is_liked(self) -> bool {
        matches!(self, Self::Liked)
    }

    /// The only transition: each toggle flips the state.
    pub fn toggled(self) -> Self {
        match self {
            Self::Liked => Self::NotLiked,
            Self::NotLiked => Self::Liked,
        }
    }

    /// Aggregate adjustment applied when entering this state.
    pub fn entry_delta(self) -> i64 {
        match self {
            Self::Liked => 1,
            Self::NotLiked => -1,
        }
    }

    /// Aggregate a cold post holds right after entering this state.
    pub fn cold_count(self) -> u64 {
        match self {
            Self::Liked => 1,
            Self::NotLiked => 0,
        }
    }
}

/// Engagement of one post as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngagementView {
    pub post_id: String,
    pub like_count: u64,
    pub is_liked_by_viewer: bool,
}

impl EngagementView {
    pub fn new(post_id: impl Into<String>, like_count: u64, is_liked_by_viewer: bool) -> Self {
        Self {
            post_id: post_id.into(),
            like_count,
            is_liked_by_viewer,
        }
    }

    /// Engagement of a post nobody has liked yet.
    pub fn empty(post_id: impl Into<String>) -> Self {
        Self::new(post_id, 0, false)
    }
}
