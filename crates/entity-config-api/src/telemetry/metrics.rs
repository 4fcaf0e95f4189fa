//! Prometheus metrics for payload validation and config writes
//!
//! - `validation_requests_total` (counter) - validations by entity type and result
//! - `validation_duration_seconds` (histogram) - validation latency by entity type
//! - `validation_issues_total` (counter) - reported issues by kind
//! - `config_writes_total` (counter) - entity config creates and updates
//!
//! Every metric lives in the `entity_config` namespace.
//!
//! # Example
//!
//! ```rust
//! use entity_config_api::telemetry::ValidationMetricsRegistry;
//!
//! let registry = ValidationMetricsRegistry::new().unwrap();
//! let metrics = registry.validation();
//!
//! metrics.record_validation("usuario", true);
//! metrics.observe_duration("usuario", 0.002);
//! metrics.record_config_write("create");
//!
//! assert!(registry.encode_text().unwrap().contains("validation_requests_total"));
//! ```

use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;
use std::time::Instant;

use entity_config_core::ValidationIssue;

use super::{Result, TelemetryError};

const NAMESPACE: &str = "entity_config";

/// Validation metrics for Prometheus
pub struct ValidationMetrics {
    /// Validations by entity type and result
    requests_total: CounterVec,

    /// Validation duration in seconds by entity type
    duration_seconds: HistogramVec,

    /// Issues reported by kind
    issues_total: CounterVec,

    /// Config writes by operation
    config_writes_total: CounterVec,
}

impl ValidationMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: Arc<Registry>) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new(
                "validation_requests_total",
                "Total number of custom-data validations",
            )
            .namespace(NAMESPACE),
            &["entity_type", "result"],
        )?;

        let duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "validation_duration_seconds",
                "Custom-data validation duration in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["entity_type"],
        )?;

        let issues_total = CounterVec::new(
            Opts::new(
                "validation_issues_total",
                "Total number of validation issues by kind",
            )
            .namespace(NAMESPACE),
            &["kind"],
        )?;

        let config_writes_total = CounterVec::new(
            Opts::new(
                "config_writes_total",
                "Total number of entity config writes",
            )
            .namespace(NAMESPACE),
            &["operation"],
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(duration_seconds.clone()))?;
        registry.register(Box::new(issues_total.clone()))?;
        registry.register(Box::new(config_writes_total.clone()))?;

        Ok(Self {
            requests_total,
            duration_seconds,
            issues_total,
            config_writes_total,
        })
    }

    /// Record the outcome of one validation
    pub fn record_validation(&self, entity_type: &str, valid: bool) {
        let result = if valid { "valid" } else { "invalid" };
        self.requests_total
            .with_label_values(&[entity_type, result])
            .inc();
    }

    pub fn observe_duration(&self, entity_type: &str, duration_secs: f64) {
        self.duration_seconds
            .with_label_values(&[entity_type])
            .observe(duration_secs);
    }

    /// Count each issue under its kind
    pub fn record_issues<'a>(&self, issues: impl IntoIterator<Item = &'a ValidationIssue>) {
        for issue in issues {
            self.issues_total
                .with_label_values(&[issue.kind.as_str()])
                .inc();
        }
    }

    pub fn record_config_write(&self, operation: &str) {
        self.config_writes_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Start a timer that observes the duration when dropped
    pub fn start_timer(&self, entity_type: &str) -> ValidationTimer<'_> {
        ValidationTimer {
            start: Instant::now(),
            entity_type: entity_type.to_string(),
            metrics: self,
        }
    }
}

/// RAII guard for timing validations
pub struct ValidationTimer<'a> {
    start: Instant,
    entity_type: String,
    metrics: &'a ValidationMetrics,
}

impl<'a> ValidationTimer<'a> {
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl<'a> Drop for ValidationTimer<'a> {
    fn drop(&mut self) {
        self.metrics
            .observe_duration(&self.entity_type, self.start.elapsed().as_secs_f64());
    }
}

/// Registry for all service metrics
pub struct ValidationMetricsRegistry {
    registry: Arc<Registry>,
    validation: ValidationMetrics,
}

impl ValidationMetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create with an existing Prometheus registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let validation = ValidationMetrics::new(Arc::clone(&registry))?;

        Ok(Self {
            registry,
            validation,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn validation(&self) -> &ValidationMetrics {
        &self.validation
    }

    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.gather(), &mut buffer)
            .map_err(|e| TelemetryError::MetricsError(prometheus::Error::Msg(e.to_string())))?;
        String::from_utf8(buffer)
            .map_err(|e| TelemetryError::MetricsError(prometheus::Error::Msg(e.to_string())))
    }
}

impl std::fmt::Debug for ValidationMetricsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationMetricsRegistry").finish_non_exhaustive()
    }
}
