use crate::application::repos::RepoError;

/// Postgres SQLSTATE codes the repositories distinguish.
mod sqlstate {
    pub const UNIQUE_VIOLATION: &str = "23505";
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    pub const NOT_NULL_VIOLATION: &str = "23502";
    pub const INVALID_TEXT_REPRESENTATION: &str = "22P02";
    pub const QUERY_CANCELED: &str = "57014";
}

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    let db = match err {
        sqlx::Error::RowNotFound => return RepoError::NotFound,
        sqlx::Error::PoolTimedOut => return RepoError::Timeout,
        sqlx::Error::Database(db) => db,
        other => return RepoError::from_persistence(other),
    };

    match db.code().as_deref() {
        Some(sqlstate::UNIQUE_VIOLATION) => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        Some(
            sqlstate::FOREIGN_KEY_VIOLATION
            | sqlstate::NOT_NULL_VIOLATION
            | sqlstate::INVALID_TEXT_REPRESENTATION,
        ) => RepoError::InvalidInput {
            message: db.message().to_string(),
        },
        Some(sqlstate::QUERY_CANCELED) => RepoError::Timeout,
        _ => RepoError::from_persistence(db),
    }
}
