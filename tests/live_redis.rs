//! Engagement cache tests against a running Redis.
//!
//! - Marked `#[ignore]`; run with `cargo test --test live_redis -- --ignored`.
//! - Reads the server address from `LIKEFEED_TEST_REDIS_URL`
//!   (default `redis://127.0.0.1:6379`).
//! - Every test works on post ids unique to the run, so a shared server is fine.

use std::sync::Arc;

use futures::future::join_all;
use likefeed::cache::{
    AGGREGATE_FIELD, CacheConfig, EngagementService, KvBackend, ToggleStrategy, likes_key,
};
use likefeed::domain::engagement::{EngagementView, ViewerId};
use likefeed::infra::redis::RedisBackend;
use uuid::Uuid;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

async fn backend() -> TestResult<Arc<RedisBackend>> {
    let url = std::env::var("LIKEFEED_TEST_REDIS_URL")
        .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    Ok(Arc::new(RedisBackend::connect(&url).await?))
}

fn service(backend: Arc<RedisBackend>, strategy: ToggleStrategy) -> EngagementService {
    let config = CacheConfig {
        toggle_strategy: strategy,
        ..CacheConfig::default()
    };
    EngagementService::new(backend, &config)
}

fn unique_post() -> String {
    format!("live-{}", Uuid::new_v4())
}

fn viewer(id: &str) -> ViewerId {
    ViewerId::parse(id).expect("valid viewer")
}

#[tokio::test]
#[ignore]
async fn live_toggle_scenario_matches_both_strategies() -> TestResult<()> {
    let backend = backend().await?;

    for strategy in [ToggleStrategy::Auto, ToggleStrategy::KeyedLock] {
        let service = service(backend.clone(), strategy);
        let post = unique_post();

        let first = service.toggle(&post, &viewer("u1")).await?;
        assert_eq!(first, EngagementView::new(post.as_str(), 1, true));
        let second = service.toggle(&post, &viewer("u2")).await?;
        assert_eq!(second, EngagementView::new(post.as_str(), 2, true));
        let third = service.toggle(&post, &viewer("u1")).await?;
        assert_eq!(third, EngagementView::new(post.as_str(), 1, false));

        let stored = backend.hget(&likes_key(&post), "u1").await?;
        assert_eq!(stored, None, "unliked flag must be deleted");
    }
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_decorate_seeds_cold_posts() -> TestResult<()> {
    let backend = backend().await?;
    let service = service(backend.clone(), ToggleStrategy::Auto);
    let liked = unique_post();
    let cold = unique_post();

    service.toggle(&liked, &viewer("u1")).await?;
    let views = service
        .decorate_page(&[liked.as_str(), cold.as_str()], &viewer("u1"))
        .await?;

    assert_eq!(
        views,
        vec![
            EngagementView::new(liked.as_str(), 1, true),
            EngagementView::new(cold.as_str(), 0, false),
        ]
    );
    let seeded = backend.hget(&likes_key(&cold), AGGREGATE_FIELD).await?;
    assert_eq!(seeded.as_deref(), Some("0"));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn live_concurrent_toggles_converge() -> TestResult<()> {
    const USERS: usize = 24;

    let backend = backend().await?;
    let service = service(backend, ToggleStrategy::Auto);
    let post = unique_post();

    let tasks = (0..USERS).map(|n| {
        let service = service.clone();
        let post = post.clone();
        tokio::spawn(async move {
            let viewer = viewer(&format!("user-{n}"));
            // Three flips from one user leave exactly one like.
            for _ in 0..3 {
                service.toggle(&post, &viewer).await?;
            }
            Ok::<_, likefeed::cache::ToggleError>(())
        })
    });
    for outcome in join_all(tasks).await {
        outcome??;
    }

    let views = service.decorate_page(&[post.as_str()], &viewer("user-0")).await?;
    assert_eq!(views[0], EngagementView::new(post.as_str(), USERS as u64, true));
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_script_reads_aggregates_like_the_parsers() -> TestResult<()> {
    let backend = backend().await?;
    let service = service(backend.clone(), ToggleStrategy::Auto);

    // (stored aggregate, count after one like)
    let cases = [(" 3 ", 4), ("+2", 3), ("0x10", 1), ("1e3", 1), ("2.5", 1), ("-4", 1)];
    for (stored, expected) in cases {
        let post = unique_post();
        backend.hset(&likes_key(&post), AGGREGATE_FIELD, stored).await?;

        let view = service.toggle(&post, &viewer("u1")).await?;
        assert_eq!(view, EngagementView::new(post.as_str(), expected, true), "{stored:?}");
    }
    Ok(())
}
