//! Typed settings for the likefeed binary.
//!
//! Sources are layered by the `config` crate, lowest first: built-in defaults,
//! `config/default.toml`, `likefeed.toml`, an explicit `--config-file`,
//! `LIKEFEED__SECTION__KEY` environment variables, and finally CLI flags.

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    time::Duration,
};

use clap::Parser;
use config::{
    Config, ConfigError, Environment, File,
    builder::{ConfigBuilder, DefaultState},
};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::ToggleStrategy;

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

type Builder = ConfigBuilder<DefaultState>;

const SHARED_CONFIG: &str = "config/default";
const LOCAL_CONFIG: &str = "likefeed";
const ENV_PREFIX: &str = "LIKEFEED";
const MAX_CACHE_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// How long in-flight requests may run after a shutdown signal.
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Unset until a source provides a non-blank value; required only at connect time.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
    pub seed_defaults: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackendKind {
    Redis,
    Memory,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub backend: CacheBackendKind,
    pub url: String,
    pub operation_timeout_ms: NonZeroU64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub toggle_strategy: ToggleStrategy,
    pub degrade_on_unavailable: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not assemble configuration sources: {0}")]
    Build(#[from] ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

fn invalid(key: &'static str, reason: impl Into<String>) -> LoadError {
    LoadError::Invalid {
        key,
        reason: reason.into(),
    }
}

/// Parse the command line and resolve settings from every source.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(SHARED_CONFIG).required(false))
        .add_source(File::with_name(LOCAL_CONFIG).required(false));
    if let Some(path) = cli.config_file.as_deref() {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    resolve(builder, cli.command.as_ref())
}

/// Apply defaults below and CLI flags above the sources already in `builder`.
fn resolve(builder: Builder, command: Option<&Command>) -> Result<Settings, LoadError> {
    let builder = with_defaults(builder)?;
    let builder = match command {
        Some(Command::Serve(args)) => args.overrides.apply(builder)?,
        Some(Command::Migrate(args)) => args.database.apply(builder)?,
        None => builder,
    };

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Ok(Settings {
        server: raw.server.try_into()?,
        logging: raw.logging.try_into()?,
        database: raw.database.try_into()?,
        cache: raw.cache.try_into()?,
    })
}

fn with_defaults(builder: Builder) -> Result<Builder, ConfigError> {
    builder
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8080_u64)?
        .set_default("server.graceful_shutdown_seconds", 30_u64)?
        .set_default("logging.level", "info")?
        .set_default("logging.json", false)?
        .set_default("database.max_connections", 8_u64)?
        .set_default("database.seed_defaults", true)?
        .set_default("cache.backend", "redis")?
        .set_default("cache.url", "redis://127.0.0.1:6379")?
        .set_default("cache.operation_timeout_ms", 250_u64)?
        .set_default("cache.retry_attempts", 2_u64)?
        .set_default("cache.retry_backoff_ms", 20_u64)?
        .set_default("cache.toggle_strategy", "auto")?
        .set_default("cache.degrade_on_unavailable", false)
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    server: RawServer,
    logging: RawLogging,
    database: RawDatabase,
    cache: RawCache,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    host: String,
    port: u16,
    graceful_shutdown_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct RawLogging {
    level: String,
    json: bool,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    url: Option<String>,
    max_connections: u32,
    seed_defaults: bool,
}

#[derive(Debug, Deserialize)]
struct RawCache {
    backend: CacheBackendKind,
    url: String,
    operation_timeout_ms: u64,
    retry_attempts: u32,
    retry_backoff_ms: u64,
    toggle_strategy: String,
    degrade_on_unavailable: bool,
}

impl TryFrom<RawServer> for ServerSettings {
    type Error = LoadError;

    fn try_from(raw: RawServer) -> Result<Self, LoadError> {
        if raw.port == 0 {
            return Err(invalid("server.port", "must be greater than zero"));
        }
        let candidate = format!("{}:{}", raw.host.trim(), raw.port);
        let addr = candidate
            .parse()
            .map_err(|err| invalid("server.host", format!("`{candidate}` is not an address: {err}")))?;
        if raw.graceful_shutdown_seconds == 0 {
            return Err(invalid(
                "server.graceful_shutdown_seconds",
                "must be greater than zero",
            ));
        }

        Ok(Self {
            addr,
            graceful_shutdown: Duration::from_secs(raw.graceful_shutdown_seconds),
        })
    }
}

impl TryFrom<RawLogging> for LoggingSettings {
    type Error = LoadError;

    fn try_from(raw: RawLogging) -> Result<Self, LoadError> {
        let level = raw
            .level
            .trim()
            .parse::<LevelFilter>()
            .map_err(|err| invalid("logging.level", err.to_string()))?;
        let format = if raw.json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };
        Ok(Self { level, format })
    }
}

impl TryFrom<RawDatabase> for DatabaseSettings {
    type Error = LoadError;

    fn try_from(raw: RawDatabase) -> Result<Self, LoadError> {
        let url = raw
            .url
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let max_connections = NonZeroU32::new(raw.max_connections)
            .ok_or_else(|| invalid("database.max_connections", "must be greater than zero"))?;

        Ok(Self {
            url,
            max_connections,
            seed_defaults: raw.seed_defaults,
        })
    }
}

impl TryFrom<RawCache> for CacheSettings {
    type Error = LoadError;

    fn try_from(raw: RawCache) -> Result<Self, LoadError> {
        let url = raw.url.trim().to_owned();
        if raw.backend == CacheBackendKind::Redis && url.is_empty() {
            return Err(invalid("cache.url", "required when the backend is redis"));
        }
        let operation_timeout_ms = NonZeroU64::new(raw.operation_timeout_ms)
            .ok_or_else(|| invalid("cache.operation_timeout_ms", "must be greater than zero"))?;
        if raw.retry_attempts > MAX_CACHE_RETRY_ATTEMPTS {
            return Err(invalid(
                "cache.retry_attempts",
                format!("must not exceed {MAX_CACHE_RETRY_ATTEMPTS}"),
            ));
        }
        let toggle_strategy = raw
            .toggle_strategy
            .parse::<ToggleStrategy>()
            .map_err(|reason| invalid("cache.toggle_strategy", reason))?;

        Ok(Self {
            backend: raw.backend,
            url,
            operation_timeout_ms,
            retry_attempts: raw.retry_attempts,
            retry_backoff_ms: raw.retry_backoff_ms,
            toggle_strategy,
            degrade_on_unavailable: raw.degrade_on_unavailable,
        })
    }
}

#[cfg(test)]
mod tests;
