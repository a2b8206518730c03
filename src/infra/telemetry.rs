use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_PAGE_CACHE_EVICT, METRIC_PAGE_CACHE_EXPIRED, METRIC_PAGE_CACHE_HIT,
    METRIC_PAGE_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

const QUIET_SQLX_DIRECTIVE: &str = "sqlx::query=warn";

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let mut env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();
    if std::env::var_os(EnvFilter::DEFAULT_ENV).is_none() {
        // sqlx logs every statement at info.
        let directive = QUIET_SQLX_DIRECTIVE
            .parse()
            .map_err(|err| InfraError::telemetry(format!("invalid log directive: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }

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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_PAGE_CACHE_HIT,
            Unit::Count,
            "Total number of page cache hits."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_MISS,
            Unit::Count,
            "Total number of page cache misses, expired lookups included."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_EXPIRED,
            Unit::Count,
            "Total number of page cache entries dropped after their TTL."
        );
        describe_counter!(
            METRIC_PAGE_CACHE_EVICT,
            Unit::Count,
            "Total number of page cache evictions due to capacity."
        );
    });
}
