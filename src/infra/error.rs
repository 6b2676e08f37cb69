use std::net::SocketAddr;

use thiserror::Error;

/// Failures while bringing up the process: sockets, database, logging.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error("failed to bind listener on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("database {stage} failed")]
    Database {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("database url is not configured; set LIKEFEED__DATABASE__URL or --database-url")]
    MissingDatabaseUrl,
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

impl InfraError {
    pub fn database(stage: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { stage, source }
    }
}
