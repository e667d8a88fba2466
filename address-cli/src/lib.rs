//! Command-line interface for the address lookup service.
//!
//! `serve` runs the HTTP service against `<data-dir>/data.db`; `import`
//! builds a store file from a JSON list of addresses. Options layer CLI
//! flags over configuration files and `ADDRESS_*` environment variables.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod error;
pub mod http;
mod import;
mod serve;

pub use error::CliError;
use import::ImportArgs;
use serve::ServeArgs;

const ARG_BIND: &str = "bind";
const ARG_DATA_DIR: &str = "data-dir";
const ARG_INPUT: &str = "input";
const ARG_OUTPUT: &str = "output";
const ENV_IMPORT_INPUT: &str = "ADDRESS_CMDS_IMPORT_INPUT";
const ENV_IMPORT_OUTPUT: &str = "ADDRESS_CMDS_IMPORT_OUTPUT";

/// Listen address used when none is configured.
pub const DEFAULT_BIND: &str = "0.0.0.0:8809";
/// Data directory used when none is configured.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Run the CLI with the current process arguments and environment.
///
/// # Errors
/// Returns [`CliError`] when parsing, configuration or the chosen command
/// fails.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    init_logging()?;
    match cli.command {
        Command::Serve(args) => serve::run_serve(args),
        Command::Import(args) => import::run_import(args),
    }
}

/// Route `log` records through a `tracing` fmt subscriber. `RUST_LOG`
/// overrides the default `info` level.
fn init_logging() -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(CliError::Logging)
}

#[derive(Debug, Parser)]
#[command(
    name = "address-server",
    about = "Fulltext address search and reverse geocoding over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the query and admin APIs.
    Serve(ServeArgs),
    /// Build a store file from a JSON list of addresses.
    Import(ImportArgs),
}

#[cfg(test)]
mod tests;
