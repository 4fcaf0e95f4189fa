//! Command-line interface
//!
//! Starts the server, validates payload files offline, checks schemas and
//! lists the registered rules.

pub mod commands;
pub mod output;

pub use commands::{Commands, EntityConfigCli, ServeArgs};
pub use output::{OutputFormat, RulesOutput, SchemaCheckOutput, ValidationOutput};

use crate::error::CliError;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Successful execution, payload or schema valid
    Success = 0,
    /// Payload failed validation
    ValidationError = 1,
    /// Schema valid but references unregistered rules
    ValidationWarning = 2,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Schema-related errors
    SchemaError = 5,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code from validation result
    pub fn from_validation_result(has_errors: bool, has_warnings: bool) -> Self {
        if has_errors {
            ExitCode::ValidationError
        } else if has_warnings {
            ExitCode::ValidationWarning
        } else {
            ExitCode::Success
        }
    }

    /// Exit code reported for a failed command
    pub fn from_error(err: &CliError) -> Self {
        match err {
            CliError::FileError(_) => ExitCode::FileError,
            CliError::SchemaError(_) => ExitCode::SchemaError,
            CliError::InvalidInput(_) | CliError::ParseError(_) => ExitCode::InvalidInput,
            CliError::SerializationError(_) | CliError::ServerError(_) | CliError::InternalError(_) => {
                ExitCode::InternalError
            }
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: EntityConfigCli) -> Result<ExitCode, CliError> {
    let quiet = cli.quiet;
    let format = |format: OutputFormat| (!quiet).then_some(format);

    match cli.command {
        Commands::Serve(args) => commands::execute_serve(args).await,
        Commands::Validate {
            ref schema,
            ref payload,
            ref container_key,
            format: output,
        } => commands::execute_validate(schema, payload, container_key.clone(), format(output)),
        Commands::Check { ref schema, format: output } => commands::execute_check(schema, format(output)),
        Commands::Rules { format: output } => commands::execute_rules(format(output)),
    }
}
