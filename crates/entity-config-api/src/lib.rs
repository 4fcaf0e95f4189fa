//! Entity Config API
//!
//! HTTP server and CLI around `entity-config-core`: tenants store a
//! custom-field schema per entity type, and every record write is validated
//! against it before it reaches storage.
//!
//! ## Modules
//!
//! - `service`: config management and validated record writes
//! - `handler`: axum routes under `/api/v1`, health and metrics
//! - `telemetry`: tracing setup and Prometheus metrics
//! - `config`: layered server configuration
//! - `cli`: the `entity-config` command line
//!
//! ## CLI Usage
//!
//! ```bash
//! # Start the server on sled storage
//! entity-config serve --storage sled --data-dir ./data
//!
//! # Validate a payload offline
//! entity-config validate --schema usuario.yaml --payload payload.json --format json
//!
//! # Check a schema and list the available rules
//! entity-config check --schema usuario.yaml
//! entity-config rules
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod handler;
pub mod service;
pub mod telemetry;

pub use cli::{Commands, EntityConfigCli, ExitCode, OutputFormat};
pub use config::{ConfigError, ServerConfig};
pub use error::{CliError, ServiceError, ServiceResult};
pub use handler::{create_router, ApiError, ApiResponse, AppState, ErrorInfo, HealthResponse, HealthStatus};
pub use service::{ConfigService, RecordService};
pub use telemetry::{init_tracing, TelemetryError, ValidationMetrics, ValidationMetricsRegistry};

/// Run the CLI application
///
/// This is the main entry point for the binary. The caller installs the
/// tracing subscriber for offline commands; `serve` installs its own from the
/// server configuration.
pub async fn run_cli(cli: EntityConfigCli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from_error(&e)
        }
    }
}
