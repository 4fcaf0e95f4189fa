//! CLI command definitions
//!
//! `serve` starts the HTTP server. `validate`, `check` and `rules` work
//! offline on schema and payload files.

use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use entity_config_core::{CompiledSchema, ConfigSchema, RuleRegistry, ValidationEngine};
use entity_config_storage::StorageKind;

use super::output::{OutputFormat, RulesOutput, SchemaCheckOutput, ValidationOutput};
use super::ExitCode;
use crate::config::{ConfigError, ServerConfig};
use crate::error::{CliError, Result};
use crate::handler::{create_router, AppState};
use crate::telemetry::{init_tracing, ValidationMetricsRegistry};

/// Entity Config CLI
///
/// Serve the entity config API, or validate payloads against custom-field
/// schemas from the command line.
#[derive(Parser, Debug)]
#[command(name = "entity-config")]
#[command(about = "Entity Config - per-tenant custom-field schemas and validation", long_about = None)]
#[command(version)]
pub struct EntityConfigCli {
    /// Output verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl EntityConfigCli {
    /// Log filter for the offline commands
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Validate a payload file against a schema file
    ///
    /// Exits with 0 when the payload is valid and 1 when it has issues.
    Validate {
        /// Schema file (JSON, YAML or TOML) holding `{"fields": [...]}`
        #[arg(short, long)]
        schema: PathBuf,

        /// Payload file (JSON or YAML) holding the custom data object
        #[arg(short, long)]
        payload: PathBuf,

        /// Key reported as the first segment of every issue path
        #[arg(long)]
        container_key: Option<String>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Check a schema file without validating a payload
    Check {
        /// Schema file (JSON, YAML or TOML)
        #[arg(short, long)]
        schema: PathBuf,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List the registered validation rules
    Rules {
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Flags of `serve`; each one overrides the file and the environment
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long, env = "ENTITY_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Storage backend (memory or sled)
    #[arg(long)]
    pub storage: Option<StorageKind>,

    /// Directory of the sled database
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

impl ServeArgs {
    /// Defaults, then the config file, then the environment, then these flags
    pub fn resolve(&self) -> Result<ServerConfig> {
        let mut config = ServerConfig::load(self.config.as_deref())?;
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(storage) = self.storage {
            config.storage = storage;
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io { .. } => CliError::FileError(err.to_string()),
            ConfigError::Parse(_) => CliError::ParseError(err.to_string()),
            ConfigError::Invalid(_) => CliError::InvalidInput(err.to_string()),
        }
    }
}

/// Execute the serve command; returns once the server has shut down
pub async fn execute_serve(args: ServeArgs) -> Result<ExitCode> {
    let config = args.resolve()?;
    init_tracing(&config.log_level, config.log_json)
        .map_err(|e| CliError::InternalError(e.to_string()))?;

    let addr = config.socket_addr()?;
    let stores = entity_config_storage::open(config.storage, &config.data_dir).map_err(|e| {
        CliError::ServerError(format!("Failed to open {} storage: {}", config.storage, e))
    })?;
    let metrics = if config.metrics {
        let registry = ValidationMetricsRegistry::new().map_err(|e| CliError::InternalError(e.to_string()))?;
        Some(Arc::new(registry))
    } else {
        None
    };

    let router = create_router(AppState::new(stores, config.build_engine(), metrics));

    info!(
        %addr,
        storage = %config.storage,
        container_key = %config.container_key,
        version = env!("CARGO_PKG_VERSION"),
        "Starting entity config server"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| CliError::ServerError(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::ServerError(e.to_string()))?;

    info!("Server stopped");
    Ok(ExitCode::Success)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Execute the validate command
pub fn execute_validate(
    schema: &Path,
    payload: &Path,
    container_key: Option<String>,
    format: Option<OutputFormat>,
) -> Result<ExitCode> {
    let schema = load_schema(schema)?;
    let payload = load_payload(payload)?;

    let mut engine = ValidationEngine::with_builtins();
    if let Some(key) = container_key {
        engine = engine.with_container_key(key);
    }

    let start = Instant::now();
    let report = engine.dry_run(&payload, &schema)?;
    let duration_ms = start.elapsed().as_millis() as u64;

    if let Some(format) = format {
        ValidationOutput::from_report(&report, Some(duration_ms)).render(format)?;
    }

    Ok(ExitCode::from_validation_result(!report.valid, false))
}

/// Execute the check command.
///
/// Invariant violations exit with the schema error code; references to
/// unregistered rules only warn.
pub fn execute_check(schema: &Path, format: Option<OutputFormat>) -> Result<ExitCode> {
    let schema = load_schema(schema)?;
    let registry = RuleRegistry::with_builtins();

    let unknown_rules: Vec<String> = schema
        .referenced_rules()
        .into_iter()
        .filter(|rule| !registry.contains(rule))
        .map(str::to_string)
        .collect();
    let rule_count = schema.fields.iter().map(|f| f.validations.len()).sum();

    let (output, exit_code) = match CompiledSchema::compile(&schema) {
        Ok(compiled) => {
            let exit_code = ExitCode::from_validation_result(false, !unknown_rules.is_empty());
            let output = SchemaCheckOutput {
                valid: true,
                field_count: compiled.fields().len(),
                rule_count,
                error: None,
                unknown_rules,
                fingerprint: Some(compiled.fingerprint().to_string()),
            };
            (output, exit_code)
        }
        Err(err) => {
            let output = SchemaCheckOutput {
                valid: false,
                field_count: schema.fields.len(),
                rule_count,
                error: Some(err.to_string()),
                unknown_rules,
                fingerprint: None,
            };
            (output, ExitCode::SchemaError)
        }
    };

    if let Some(format) = format {
        output.render(format)?;
    }
    Ok(exit_code)
}

/// Execute the rules command
pub fn execute_rules(format: Option<OutputFormat>) -> Result<ExitCode> {
    let output = RulesOutput {
        rules: RuleRegistry::with_builtins().list_metadata(),
    };
    if let Some(format) = format {
        output.render(format)?;
    }
    Ok(ExitCode::Success)
}

fn read_file(path: &Path, what: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CliError::FileError(format!("Failed to read {} file '{}': {}", what, path.display(), e))
    })
}

fn load_schema(path: &Path) -> Result<ConfigSchema> {
    let content = read_file(path, "schema")?;
    let value = parse_document(path, &content)?;
    serde_json::from_value(value)
        .map_err(|e| CliError::SchemaError(format!("Invalid schema '{}': {}", path.display(), e)))
}

fn load_payload(path: &Path) -> Result<Map<String, Value>> {
    let content = read_file(path, "payload")?;
    match parse_document(path, &content)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::InvalidInput(format!(
            "Payload '{}' must be an object, found {}",
            path.display(),
            json_type_name(&other)
        ))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Parse a JSON, YAML or TOML document, chosen by file extension
pub fn parse_document(path: &Path, content: &str) -> Result<Value> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "json" => serde_json::from_str(content)
            .map_err(|e| CliError::ParseError(format!("Invalid JSON: {}", e))),
        "yaml" | "yml" => serde_yaml::from_str(content)
            .map_err(|e| CliError::ParseError(format!("Invalid YAML: {}", e))),
        "toml" => {
            let toml_value: toml::Value = toml::from_str(content)
                .map_err(|e| CliError::ParseError(format!("Invalid TOML: {}", e)))?;
            serde_json::to_value(toml_value).map_err(|e| CliError::SerializationError(e.to_string()))
        }
        _ => Err(CliError::InvalidInput(format!(
            "Unsupported file format: {}. Supported formats: json, yaml, yml, toml",
            extension
        ))),
    }
}
