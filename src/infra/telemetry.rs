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

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register units and help text for every metric the engine records.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "folio_cache_hit_total",
            Unit::Count,
            "Total number of read cache hits."
        );
        describe_counter!(
            "folio_cache_miss_total",
            Unit::Count,
            "Total number of read cache misses, labelled by reason."
        );
        describe_counter!(
            "folio_cache_evict_total",
            Unit::Count,
            "Total number of read cache evictions due to capacity."
        );
        describe_counter!(
            "folio_cache_tag_invalidations_total",
            Unit::Count,
            "Total number of cache tags invalidated."
        );
        describe_counter!(
            "folio_uri_conflicts_total",
            Unit::Count,
            "Total number of generated URIs already claimed by another document."
        );
        describe_counter!(
            "folio_cascade_failures_total",
            Unit::Count,
            "Total number of cascade dependents that failed to regenerate."
        );
        describe_histogram!(
            "folio_cascade_ms",
            Unit::Milliseconds,
            "Cascade job latency in milliseconds."
        );
        describe_histogram!(
            "folio_invalidation_batch_size",
            Unit::Count,
            "Number of document changes per batch invalidation."
        );
    });
}
