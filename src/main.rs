use std::{future::IntoFuture, pin::pin, process, sync::Arc};

use likefeed::{
    application::{
        error::AppError,
        feed::FeedService,
        repos::{HealthRepo, PostsRepo, PostsWriteRepo, UsersRepo},
    },
    cache::{CacheConfig, EngagementService, KvBackend, MemoryBackend},
    config::{self, CacheBackendKind},
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        redis::RedisBackend,
        telemetry,
    },
};
use tokio::sync::Notify;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let backend = init_cache_backend(&settings.cache).await?;
    let engagement = EngagementService::new(backend, &CacheConfig::from(&settings.cache));

    if let Err(err) = engagement.ping().await {
        warn!(
            target = "likefeed::startup",
            backend = engagement.backend_name(),
            error = %err,
            "cache backend did not answer ping; engagement calls will fail until it recovers"
        );
    }

    let posts: Arc<dyn PostsRepo> = repositories.clone();
    let writer: Arc<dyn PostsWriteRepo> = repositories.clone();
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let db: Arc<dyn HealthRepo> = repositories;

    let state = ApiState {
        feed: Arc::new(FeedService::new(posts, writer, users, engagement)),
        db,
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    init_repositories(&settings).await?;
    info!(
        target = "likefeed::migrate",
        seed_defaults = settings.database.seed_defaults,
        "database is up to date"
    );
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or(InfraError::MissingDatabaseUrl)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(InfraError::database("connect"))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::database("migration"))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));

    if settings.database.seed_defaults && repositories.seed_defaults().await? {
        info!(target = "likefeed::startup", "seeded default users and posts");
    }

    Ok(repositories)
}

async fn init_cache_backend(
    settings: &config::CacheSettings,
) -> Result<Arc<dyn KvBackend>, AppError> {
    let backend: Arc<dyn KvBackend> = match settings.backend {
        CacheBackendKind::Redis => Arc::new(RedisBackend::connect(&settings.url).await?),
        CacheBackendKind::Memory => {
            warn!(
                target = "likefeed::startup",
                "using the in-process cache backend; engagement is lost on restart"
            );
            Arc::new(MemoryBackend::new())
        }
    };
    Ok(backend)
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))?;
    info!(target = "likefeed::startup", %addr, "listening");

    let router = http::build_router(state);
    let stop = Arc::new(Notify::new());
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown({
        let stop = Arc::clone(&stop);
        async move { stop.notified().await }
    });
    let mut server = pin!(server.into_future());

    tokio::select! {
        result = &mut server => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => {
            info!(target = "likefeed::shutdown", "shutdown requested; draining connections");
            stop.notify_one();
        }
    }

    match tokio::time::timeout(settings.server.graceful_shutdown, server).await {
        Ok(result) => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))
        }
        Err(_) => {
            warn!(
                target = "likefeed::shutdown",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "likefeed::shutdown",
            error = %err,
            "failed to listen for ctrl-c; shutdown must be forced"
        );
        std::future::pending::<()>().await;
    }
}
