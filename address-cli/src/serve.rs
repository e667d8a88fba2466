//! `serve` command: run the HTTP service against the live store.

use std::{net::SocketAddr, sync::Arc};

use address_data::StoreManager;
use camino::Utf8PathBuf;
use clap::Parser;
use log::{info, warn};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::{
    ARG_BIND, ARG_DATA_DIR, CliError, DEFAULT_BIND, DEFAULT_DATA_DIR,
    http::{AppState, router},
};

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Serve fulltext search and reverse geocoding from \
                 <data-dir>/data.db. The database can be replaced at runtime \
                 through POST /adminapi/database/upload.",
    about = "Run the address lookup HTTP service"
)]
#[ortho_config(prefix = "ADDRESS")]
pub(crate) struct ServeArgs {
    /// Socket address to listen on (default 0.0.0.0:8809).
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub(crate) bind: Option<String>,
    /// Directory holding data.db (default ./data).
    #[arg(long = ARG_DATA_DIR, value_name = "dir")]
    #[serde(default)]
    pub(crate) data_dir: Option<Utf8PathBuf>,
}

impl ServeArgs {
    pub(crate) fn into_config(self) -> Result<ServeConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        ServeConfig::try_from(merged)
    }
}

/// Resolved `serve` command configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ServeConfig {
    /// Listen address.
    pub(crate) bind: SocketAddr,
    /// Directory holding the store files.
    pub(crate) data_dir: Utf8PathBuf,
}

impl TryFrom<ServeArgs> for ServeConfig {
    type Error = CliError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let value = args.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = match value.parse() {
            Ok(bind) => bind,
            Err(source) => return Err(CliError::InvalidBindAddress { value, source }),
        };
        let data_dir = args
            .data_dir
            .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATA_DIR));
        Ok(Self { bind, data_dir })
    }
}

pub(crate) fn run_serve(args: ServeArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let manager = Arc::new(StoreManager::initialise(config.data_dir.clone())?);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let served = runtime.block_on(serve(config.bind, Arc::clone(&manager)));
    if let Err(err) = manager.close() {
        warn!("closing the address store failed: {err}");
    }
    info!("address store closed");
    served
}

async fn serve(bind: SocketAddr, manager: Arc<StoreManager>) -> Result<(), CliError> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|source| CliError::Bind { addr: bind, source })?;
    info!(
        "listening on {bind}, serving {}",
        manager.data_dir().join(address_data::LIVE_FILE)
    );
    axum::serve(listener, router(AppState::new(manager)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(CliError::Serve)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for Ctrl-C, shutdown must be forced: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
