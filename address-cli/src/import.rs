//! `import` command: build a store file from a JSON list of addresses.

use address_data::{persist_addresses_to_sqlite, read_addresses_json};
use camino::Utf8PathBuf;
use clap::Parser;
use log::info;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_INPUT, ARG_OUTPUT, CliError, ENV_IMPORT_INPUT, ENV_IMPORT_OUTPUT};

/// CLI arguments for the `import` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Read a JSON array of addresses (street, house_number, city, \
                 longitude, latitude and an optional id) and write a store \
                 file with its fulltext index. The result can be served \
                 directly or uploaded to a running server.",
    about = "Build a store file from a JSON list of addresses"
)]
#[ortho_config(prefix = "ADDRESS")]
pub(crate) struct ImportArgs {
    /// Path to the JSON input file.
    #[arg(long = ARG_INPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) input: Option<Utf8PathBuf>,
    /// Path of the store file to write.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    pub(crate) output: Option<Utf8PathBuf>,
}

impl ImportArgs {
    pub(crate) fn into_config(self) -> Result<ImportConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ImportConfig::try_from(merged)
    }
}

/// Resolved `import` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ImportConfig {
    pub(crate) input: Utf8PathBuf,
    pub(crate) output: Utf8PathBuf,
}

impl TryFrom<ImportArgs> for ImportConfig {
    type Error = CliError;

    fn try_from(args: ImportArgs) -> Result<Self, Self::Error> {
        let input = args.input.ok_or(CliError::MissingArgument {
            field: ARG_INPUT,
            env: ENV_IMPORT_INPUT,
        })?;
        let output = args.output.ok_or(CliError::MissingArgument {
            field: ARG_OUTPUT,
            env: ENV_IMPORT_OUTPUT,
        })?;
        Ok(Self { input, output })
    }
}

pub(crate) fn run_import(args: ImportArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let written = import(&config)?;
    info!("wrote {written} addresses from {} to {}", config.input, config.output);
    Ok(())
}

pub(crate) fn import(config: &ImportConfig) -> Result<usize, CliError> {
    let addresses = read_addresses_json(&config.input)?;
    persist_addresses_to_sqlite(&config.output, &addresses).map_err(|source| {
        CliError::PersistAddresses {
            path: config.output.clone(),
            source: Box::new(source),
        }
    })
}
