//! Building store files from address lists.
//!
//! Operators produce replacement databases with the `import` subcommand;
//! tests use the same path to build fixtures.

use address_fs::open_file;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use thiserror::Error;

mod sqlite;

pub use sqlite::{PersistAddressesError, persist_addresses_to_sqlite};

/// One address as read from an import file.
///
/// Records without an `id` are numbered by SQLite on insert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddressInput {
    /// Stable identifier, if the source provides one.
    #[serde(default)]
    pub id: Option<i64>,
    /// Street name.
    pub street: String,
    /// House number, possibly with a suffix such as `12a`.
    pub house_number: String,
    /// City name.
    pub city: String,
    /// WGS84 longitude in degrees.
    pub longitude: f64,
    /// WGS84 latitude in degrees.
    pub latitude: f64,
}

/// Errors raised while reading an import file.
#[derive(Debug, Error)]
pub enum ReadAddressesError {
    /// The file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path of the import file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a JSON array of addresses.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path of the import file.
        path: Utf8PathBuf,
        /// Source error produced by `serde_json`.
        #[source]
        source: serde_json::Error,
    },
}

/// Read a JSON array of [`AddressInput`] records from `path`.
///
/// # Errors
/// Returns [`ReadAddressesError`] when the file cannot be opened or parsed.
pub fn read_addresses_json(path: &Utf8Path) -> Result<Vec<AddressInput>, ReadAddressesError> {
    let file = open_file(path).map_err(|source| ReadAddressesError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
        ReadAddressesError::Parse {
            path: path.to_path_buf(),
            source,
        }
    })
}
