use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::ConfigError;

use super::Builder;

/// Command-line arguments for the likefeed binary.
#[derive(Debug, Parser)]
#[command(name = "likefeed", version, about = "Social feed service with cached like engagement")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "LIKEFEED_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Apply database migrations and seed default data, then exit.
    Migrate(MigrateArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Toggle seeding of the default users and posts.
    #[arg(
        long = "database-seed-defaults",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub seed_defaults: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MigrateArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the cache backend (redis|memory).
    #[arg(long = "cache-backend", value_name = "BACKEND")]
    pub cache_backend: Option<String>,

    /// Override the cache connection URL.
    #[arg(long = "cache-url", value_name = "URL")]
    pub cache_url: Option<String>,

    /// Override the per-call cache timeout.
    #[arg(long = "cache-operation-timeout-ms", value_name = "MILLIS")]
    pub cache_operation_timeout_ms: Option<u64>,

    /// Override the retry budget for idempotent cache calls.
    #[arg(long = "cache-retry-attempts", value_name = "COUNT")]
    pub cache_retry_attempts: Option<u32>,

    /// Override the initial retry backoff.
    #[arg(long = "cache-retry-backoff-ms", value_name = "MILLIS")]
    pub cache_retry_backoff_ms: Option<u64>,

    /// Override the toggle strategy (auto|keyed_lock).
    #[arg(long = "cache-toggle-strategy", value_name = "STRATEGY")]
    pub cache_toggle_strategy: Option<String>,

    /// Serve listings without engagement while the cache is down.
    #[arg(
        long = "cache-degrade-on-unavailable",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_degrade_on_unavailable: Option<bool>,
}

impl DatabaseOverride {
    pub(super) fn apply(&self, builder: Builder) -> Result<Builder, ConfigError> {
        builder
            .set_override_option("database.url", self.database_url.clone())?
            .set_override_option("database.seed_defaults", self.seed_defaults)
    }
}

impl ServeOverrides {
    pub(super) fn apply(&self, builder: Builder) -> Result<Builder, ConfigError> {
        self.database
            .apply(builder)?
            .set_override_option("server.host", self.server_host.clone())?
            .set_override_option("server.port", self.server_port.map(u64::from))?
            .set_override_option(
                "server.graceful_shutdown_seconds",
                self.server_graceful_shutdown_seconds,
            )?
            .set_override_option("logging.level", self.log_level.clone())?
            .set_override_option("logging.json", self.log_json)?
            .set_override_option(
                "database.max_connections",
                self.database_max_connections.map(u64::from),
            )?
            .set_override_option("cache.backend", self.cache_backend.clone())?
            .set_override_option("cache.url", self.cache_url.clone())?
            .set_override_option(
                "cache.operation_timeout_ms",
                self.cache_operation_timeout_ms,
            )?
            .set_override_option(
                "cache.retry_attempts",
                self.cache_retry_attempts.map(u64::from),
            )?
            .set_override_option("cache.retry_backoff_ms", self.cache_retry_backoff_ms)?
            .set_override_option("cache.toggle_strategy", self.cache_toggle_strategy.clone())?
            .set_override_option(
                "cache.degrade_on_unavailable",
                self.cache_degrade_on_unavailable,
            )
    }
}
