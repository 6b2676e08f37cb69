//! Starter users and posts written into an empty database.

use time::macros::datetime;
use tracing::info;

use crate::application::repos::RepoError;
use crate::domain::entities::{PostRecord, UserRecord};

use super::PostgresRepositories;
use super::util::map_sqlx_error;

fn user(id: &str, nickname: &str, photo: &str) -> UserRecord {
    UserRecord {
        id: id.to_string(),
        nickname: nickname.to_string(),
        photo_url: format!("https://{photo}-photo.jpg"),
    }
}

pub fn default_users() -> Vec<UserRecord> {
    vec![
        user("user-1", "naruto_uzumaki", "naruto"),
        user("user-2", "tanjiro_kamada", "tanjiro"),
        user("user-3", "kilua_zoldyck", "kilua"),
        user("user-4", "satoru_gojo", "satoru"),
    ]
}

pub fn default_posts() -> Vec<PostRecord> {
    let post = |id: &str, author_id: &str, body: &str, created_at| PostRecord {
        id: id.to_string(),
        author_id: author_id.to_string(),
        body: body.to_string(),
        created_at,
    };
    vec![
        post(
            "post-1",
            "user-1",
            "Post 1 by Naruto!",
            datetime!(2025-03-26 16:11:00 UTC),
        ),
        post(
            "post-2",
            "user-2",
            "Post 2 by Tanjiro!",
            datetime!(2025-01-13 12:00:00 UTC),
        ),
        post(
            "post-3",
            "user-1",
            "Post 3 by Naruto!",
            datetime!(2025-01-01 00:00:00 UTC),
        ),
        post(
            "post-4",
            "user-4",
            "Post 4 by Satoru!",
            datetime!(2024-09-03 20:31:00 UTC),
        ),
    ]
}

impl PostgresRepositories {
    /// Insert the default data set when no user exists yet. Returns whether it ran.
    pub async fn seed_defaults(&self) -> Result<bool, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if existing > 0 {
            return Ok(false);
        }

        for user in default_users() {
            sqlx::query("INSERT INTO users (id, nickname, photo_url) VALUES ($1, $2, $3)")
                .bind(&user.id)
                .bind(&user.nickname)
                .bind(&user.photo_url)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        for post in default_posts() {
            sqlx::query(
                "INSERT INTO posts (id, author_id, body, created_at) VALUES ($1, $2, $3, $4)",
            )
            .bind(&post.id)
            .bind(&post.author_id)
            .bind(&post.body)
            .bind(post.created_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        info!(users = 4, posts = 4, "seeded default feed data");
        Ok(true)
    }
}
