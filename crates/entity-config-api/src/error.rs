//! Error types for the service layer and the CLI
//!
//! [`ServiceError`] is returned by the config and record services and is
//! mapped onto HTTP responses by the handler module. [`CliError`] covers the
//! offline commands and decides the process exit code.

use thiserror::Error;

use entity_config_core::{AggregatedValidationError, EngineError, SchemaError, StoreError};

/// Failure of a config or record operation
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The submitted schema breaks a schema invariant
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The payload failed validation; carries every issue found
    #[error(transparent)]
    Validation(#[from] AggregatedValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ServiceError::InvalidInput(msg.into())
    }
}

impl From<EngineError> for ServiceError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Schema(err) => ServiceError::Schema(err),
            EngineError::Validation(report) => ServiceError::Validation(report),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Document parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Schema-related error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Serialization error while rendering output
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Server startup or runtime failure
    #[error("Server error: {0}")]
    ServerError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl CliError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        CliError::InvalidInput(msg.into())
    }

    pub fn file_error(msg: impl Into<String>) -> Self {
        CliError::FileError(msg.into())
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        CliError::ParseError(msg.into())
    }

    pub fn schema_error(msg: impl Into<String>) -> Self {
        CliError::SchemaError(msg.into())
    }

    /// Check if this is a user-facing error (vs internal)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CliError::InvalidInput(_)
                | CliError::FileError(_)
                | CliError::ParseError(_)
                | CliError::SchemaError(_)
        )
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for CliError {
    fn from(err: serde_yaml::Error) -> Self {
        CliError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::ParseError(format!("TOML error: {}", err))
    }
}

impl From<SchemaError> for CliError {
    fn from(err: SchemaError) -> Self {
        CliError::SchemaError(err.to_string())
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
