//! Error types emitted by the address CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::{net::SocketAddr, sync::Arc};

use address_data::{PersistAddressesError, ReadAddressesError, StartupError};
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors emitted by the address CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        /// Name of the missing option.
        field: &'static str,
        /// Environment variable that can supply the option.
        env: &'static str,
    },
    /// The listen address is not a socket address.
    #[error("invalid bind address {value:?}: {source}")]
    InvalidBindAddress {
        /// Rejected address text.
        value: String,
        /// Parse failure.
        #[source]
        source: std::net::AddrParseError,
    },
    /// Installing the log subscriber failed.
    #[error("failed to install logger: {0}")]
    Logging(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The store could not be brought up.
    #[error("failed to initialise address store: {0}")]
    Startup(#[from] Box<StartupError>),
    /// Building the async runtime failed.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// Binding the listen socket failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: SocketAddr,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
    /// Reading the import file failed.
    #[error(transparent)]
    ReadAddresses(#[from] Box<ReadAddressesError>),
    /// Writing the store file failed.
    #[error("failed to import addresses into {path}: {source}")]
    PersistAddresses {
        /// Store file being written.
        path: Utf8PathBuf,
        /// Underlying persistence failure.
        #[source]
        source: Box<PersistAddressesError>,
    },
}

impl From<StartupError> for CliError {
    fn from(err: StartupError) -> Self {
        Self::Startup(Box::new(err))
    }
}

impl From<ReadAddressesError> for CliError {
    fn from(err: ReadAddressesError) -> Self {
        Self::ReadAddresses(Box::new(err))
    }
}
