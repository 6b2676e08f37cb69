use async_trait::async_trait;

use crate::application::repos::{PageRequest, PostsRepo, RepoError};
use crate::domain::entities::AuthoredPost;
use crate::infra::db::map_sqlx_error;

use super::PostgresRepositories;
use super::types::AuthoredPostRow;

const AUTHORED_POST_COLUMNS: &str = "SELECT p.id, p.author_id, p.body, p.created_at, \
     u.nickname, u.photo_url \
     FROM posts p INNER JOIN users u ON u.id = p.author_id";

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_posts(&self, page: PageRequest) -> Result<Vec<AuthoredPost>, RepoError> {
        let sql = format!(
            "{AUTHORED_POST_COLUMNS} ORDER BY p.created_at DESC, p.id DESC LIMIT $1 OFFSET $2"
        );
        let rows = sqlx::query_as::<_, AuthoredPostRow>(&sql)
            .bind(i64::from(page.limit))
            .bind(i64::from(page.offset))
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AuthoredPost::from).collect())
    }

    async fn find_post(&self, id: &str) -> Result<Option<AuthoredPost>, RepoError> {
        let sql = format!("{AUTHORED_POST_COLUMNS} WHERE p.id = $1");
        let row = sqlx::query_as::<_, AuthoredPostRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(AuthoredPost::from))
    }
}
