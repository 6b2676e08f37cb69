use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Crates whose debug output drowns the cache logs; capped unless `RUST_LOG` names them.
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=info", "redis=info"];

/// Install the global subscriber and register metric descriptions.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    tracing_subscriber::registry()
        .with(build_filter(logging))
        .with(ErrorLayer::default())
        .with(output_layer(logging.format))
        .try_init()
        .map_err(|err| InfraError::Telemetry(format!("subscriber already installed: {err}")))
}

fn build_filter(logging: &LoggingSettings) -> EnvFilter {
    let mut filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        for directive in QUIET_TARGETS.iter().filter_map(|d| d.parse().ok()) {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

fn output_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'span> tracing_subscriber::registry::LookupSpan<'span>,
{
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    }
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_histogram!(
            "likefeed_cache_op_ms",
            Unit::Milliseconds,
            "Latency of a single cache backend call, labelled by operation."
        );
        describe_counter!(
            "likefeed_cache_seeded_total",
            Unit::Count,
            "Aggregates seeded to zero on first read."
        );
        describe_counter!(
            "likefeed_cache_malformed_total",
            Unit::Count,
            "Cache fields that failed to parse, labelled by field kind."
        );
        describe_counter!(
            "likefeed_toggle_total",
            Unit::Count,
            "Completed like toggles, labelled by strategy."
        );
        describe_counter!(
            "likefeed_toggle_partial_total",
            Unit::Count,
            "Toggles that wrote the flag but failed to adjust the aggregate."
        );
        describe_counter!(
            "likefeed_feed_degraded_total",
            Unit::Count,
            "Feed listings served without engagement data."
        );
        describe_histogram!(
            "likefeed_page_limit",
            Unit::Count,
            "Requested feed page size after clamping."
        );
        describe_histogram!(
            "likefeed_page_offset",
            Unit::Count,
            "Requested feed page offset."
        );
    });
}
