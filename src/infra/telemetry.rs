use std::sync::Once;

use metrics::{Unit, describe_counter};
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
///
/// Log output goes to stderr so annotated markup on stdout stays clean.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| InfraError::telemetry(err.to_string()))
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "amberlink_links_scanned_total",
            Unit::Count,
            "Total number of outbound links matched in annotated chunks."
        );
        describe_counter!(
            "amberlink_links_annotated_total",
            Unit::Count,
            "Total number of links that received cache annotations."
        );
        describe_counter!(
            "amberlink_links_enqueued_total",
            Unit::Count,
            "Total number of unknown links queued for capture."
        );
        describe_counter!(
            "amberlink_store_errors_total",
            Unit::Count,
            "Total number of cache store failures degraded to missing annotations."
        );
        describe_counter!(
            "amberlink_capacity_exhausted_total",
            Unit::Count,
            "Total number of chunks whose annotation reserve ran out."
        );
        describe_counter!(
            "amberlink_cache_views_total",
            Unit::Count,
            "Total number of cached copies served."
        );
    });
}
