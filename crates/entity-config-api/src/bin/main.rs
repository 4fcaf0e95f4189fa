//! Entity Config CLI
//!
//! # Usage
//!
//! ```bash
//! entity-config serve --config entity-config.toml
//! entity-config validate --schema schema.json --payload payload.json
//! entity-config check --schema schema.yaml --format json
//! entity-config rules
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success - payload or schema valid
//! - 1: Payload failed validation
//! - 2: Schema references unregistered rules
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 5: Schema-related errors
//! - 10: Internal error

use anyhow::Context;
use clap::Parser;
use entity_config_api::{init_tracing, run_cli, Commands, EntityConfigCli, ExitCode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = EntityConfigCli::parse();

    // `serve` installs its own subscriber from the server configuration
    if !matches!(cli.command, Commands::Serve(_)) {
        init_tracing(cli.log_level(), false).context("Failed to initialize logging")?;
    }

    let exit_code = run_cli(cli).await;
    if exit_code != ExitCode::Success {
        std::process::exit(exit_code.into());
    }
    Ok(())
}
