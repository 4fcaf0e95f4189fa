//! Telemetry: tracing setup and Prometheus metrics
//!
//! - `metrics` - Prometheus counters and histograms for validations and config writes
//! - [`init_tracing`] - installs the global `tracing` subscriber

pub mod metrics;

pub use metrics::{ValidationMetrics, ValidationMetricsRegistry, ValidationTimer};

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Failed to initialise tracing: {0}")]
    TracingInit(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `json` every event is a
/// JSON line, otherwise the human-readable format is used.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level)).map_err(|e| {
        TelemetryError::TracingInit(format!("invalid log level '{}': {}", level, e))
    })?;

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(false)))
        .try_init()
        .map_err(|e| TelemetryError::TracingInit(e.to_string()))
}
