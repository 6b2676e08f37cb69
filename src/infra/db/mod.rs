//! Postgres-backed repository implementations.

mod posts;
pub mod seed;
mod users;
mod util;

pub use util::map_sqlx_error;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{
    Postgres, Transaction,
    migrate::Migrator,
    postgres::{PgPool, PgPoolOptions},
};

use crate::application::repos::{HealthRepo, RepoError};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Upper bound on waiting for a pooled connection before a query gives up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts and users live in the same database; one pool serves every repo trait.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: PgPool,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        MIGRATOR.run(pool).await?;
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for PostgresRepositories {
    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(drop)
            .map_err(map_sqlx_error)
    }
}
