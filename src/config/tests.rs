use config::FileFormat;

use super::*;

fn from_toml(toml: &str, command: Option<&Command>) -> Result<Settings, LoadError> {
    let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
    resolve(builder, command)
}

fn serve(overrides: ServeOverrides) -> Command {
    Command::Serve(Box::new(ServeArgs { overrides }))
}

fn rejected_key(result: Result<Settings, LoadError>) -> &'static str {
    match result {
        Err(LoadError::Invalid { key, .. }) => key,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

#[test]
fn defaults_are_valid() {
    let settings = from_toml("", None).expect("valid settings");

    assert_eq!(settings.server.addr, "127.0.0.1:8080".parse().unwrap());
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert_eq!(settings.logging.level, LevelFilter::INFO);
    assert!(settings.database.url.is_none());
    assert_eq!(settings.database.max_connections.get(), 8);
    assert!(settings.database.seed_defaults);
    assert_eq!(settings.cache.backend, CacheBackendKind::Redis);
    assert_eq!(settings.cache.url, "redis://127.0.0.1:6379");
    assert_eq!(settings.cache.operation_timeout_ms.get(), 250);
    assert_eq!(settings.cache.retry_attempts, 2);
    assert_eq!(settings.cache.retry_backoff_ms, 20);
    assert_eq!(settings.cache.toggle_strategy, ToggleStrategy::Auto);
    assert!(!settings.cache.degrade_on_unavailable);
}

#[test]
fn file_values_replace_defaults() {
    let settings = from_toml(
        r#"
        [server]
        port = 9090

        [cache]
        backend = "memory"
        toggle_strategy = "keyed_lock"
        degrade_on_unavailable = true
        "#,
        None,
    )
    .expect("valid settings");

    assert_eq!(settings.server.addr.port(), 9090);
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert_eq!(settings.cache.toggle_strategy, ToggleStrategy::KeyedLock);
    assert!(settings.cache.degrade_on_unavailable);
}

#[test]
fn cli_flags_beat_file_values() {
    let file = r#"
        [server]
        port = 4000

        [logging]
        level = "info"

        [cache]
        backend = "redis"
    "#;
    let command = serve(ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        log_json: Some(true),
        cache_backend: Some("memory".to_string()),
        cache_toggle_strategy: Some("keyed_lock".to_string()),
        ..Default::default()
    });

    let settings = from_toml(file, Some(&command)).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    assert!(matches!(settings.logging.format, LogFormat::Json));
    assert_eq!(settings.cache.backend, CacheBackendKind::Memory);
    assert_eq!(settings.cache.toggle_strategy, ToggleStrategy::KeyedLock);
}

#[test]
fn migrate_only_touches_database_keys() {
    let command = Command::Migrate(MigrateArgs {
        database: DatabaseOverride {
            database_url: Some("postgres://migrate".to_string()),
            seed_defaults: Some(false),
        },
    });

    let settings = from_toml("[server]\nport = 7000", Some(&command)).expect("valid settings");

    assert_eq!(settings.database.url.as_deref(), Some("postgres://migrate"));
    assert!(!settings.database.seed_defaults);
    assert_eq!(settings.server.addr.port(), 7000);
}

#[test]
fn invalid_values_name_their_key() {
    assert_eq!(
        rejected_key(from_toml("[cache]\noperation_timeout_ms = 0", None)),
        "cache.operation_timeout_ms"
    );
    assert_eq!(
        rejected_key(from_toml("[cache]\nretry_attempts = 11", None)),
        "cache.retry_attempts"
    );
    assert_eq!(
        rejected_key(from_toml("[cache]\ntoggle_strategy = \"script\"", None)),
        "cache.toggle_strategy"
    );
    assert_eq!(
        rejected_key(from_toml("[server]\nport = 0", None)),
        "server.port"
    );
    assert_eq!(
        rejected_key(from_toml("[logging]\nlevel = \"chatty\"", None)),
        "logging.level"
    );
    assert_eq!(
        rejected_key(from_toml("[database]\nmax_connections = 0", None)),
        "database.max_connections"
    );
}

#[test]
fn unknown_backend_fails_to_deserialize() {
    let result = from_toml("[cache]\nbackend = \"memcached\"", None);
    assert!(matches!(result, Err(LoadError::Build(_))));
}

#[test]
fn blank_database_url_is_unset() {
    let settings = from_toml("[database]\nurl = \"   \"", None).expect("valid settings");
    assert!(settings.database.url.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["likefeed"]);
    assert!(args.command.is_none());
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "likefeed",
        "migrate",
        "--database-url",
        "postgres://example",
        "--database-seed-defaults",
        "false",
    ]);

    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
            assert_eq!(migrate.database.seed_defaults, Some(false));
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "likefeed",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--cache-degrade-on-unavailable",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.cache_degrade_on_unavailable, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}
