//! Error types for the validation engine
//!
//! Schema errors describe a configuration that cannot be compiled. Rule
//! errors describe a failure inside the rule registry. Neither is ever
//! raised for bad payload data: payload problems are collected into an
//! [`AggregatedValidationError`](crate::report::AggregatedValidationError).

use thiserror::Error;

use crate::report::AggregatedValidationError;
use crate::schema::FieldType;

/// A schema violates one of its structural invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Field name must not be empty")]
    EmptyFieldName,

    #[error("Duplicate field name '{0}'")]
    DuplicateField(String),

    #[error("Select field '{0}' must declare at least one option")]
    MissingOptions(String),

    #[error("Field '{field}' of type {field_type} cannot declare options")]
    OptionsNotAllowed { field: String, field_type: FieldType },

    #[error("Field '{field}' of type {field_type} cannot declare a regex")]
    RegexNotAllowed { field: String, field_type: FieldType },

    #[error("Invalid regex for field '{field}': {reason}")]
    InvalidRegex { field: String, reason: String },
}

/// The requested rule has no registered implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Validation rule '{0}' is not registered")]
pub struct UnknownRuleError(pub String);

/// A rule could not run with the parameters it was given
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleExecutionError {
    #[error("missing required parameter '{0}'")]
    MissingParam(String),

    #[error("invalid parameter '{param}': {reason}")]
    InvalidParam { param: String, reason: String },

    #[error("unexpected parameter '{0}'")]
    UnexpectedParam(String),

    #[error("{0}")]
    Failed(String),
}

impl RuleExecutionError {
    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        RuleExecutionError::InvalidParam {
            param: param.into(),
            reason: reason.into(),
        }
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        RuleExecutionError::Failed(msg.into())
    }
}

/// Failure of [`RuleRegistry::execute`](crate::registry::RuleRegistry::execute)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Unknown(#[from] UnknownRuleError),

    #[error("Rule '{rule}' failed: {source}")]
    Execution {
        rule: String,
        #[source]
        source: RuleExecutionError,
    },
}

/// Top-level error of the validation engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Validation(#[from] AggregatedValidationError),
}

impl EngineError {
    /// Validation failures are caused by the payload; everything else by the configuration
    pub fn is_user_error(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }

    pub fn issues(&self) -> Option<&AggregatedValidationError> {
        match self {
            EngineError::Validation(report) => Some(report),
            EngineError::Schema(_) => None,
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
