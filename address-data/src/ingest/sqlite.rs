//! SQLite persistence for imported addresses.

use address_core::store::schema::create_schema;
use address_fs::ensure_parent_dir;
use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use rusqlite::{Connection, Error as SqliteError, Transaction};
use thiserror::Error;

use super::AddressInput;

/// Errors raised when persisting imported addresses to SQLite.
#[derive(Debug, Error)]
pub enum PersistAddressesError {
    /// Failed to create the parent directory for the store file.
    #[error("failed to create parent directory for {path}: {source}")]
    CreateDirectory {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path}: {source}")]
    Open {
        /// Destination database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Beginning the transaction failed.
    #[error("failed to begin address import transaction")]
    BeginTransaction {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating the table, index or triggers failed.
    #[error("failed to create address schema")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// A record carries coordinates outside the WGS84 range.
    #[error("address #{index} has invalid coordinates ({latitude}, {longitude})")]
    InvalidCoordinates {
        /// Position of the record in the input.
        index: usize,
        /// Offending latitude.
        latitude: f64,
        /// Offending longitude.
        longitude: f64,
    },
    /// Preparing the insert statement failed.
    #[error("failed to prepare address insert statement")]
    PrepareInsert {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Writing an address row failed.
    #[error("failed to persist address #{index}")]
    PersistRow {
        /// Position of the record in the input.
        index: usize,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Committing the transaction failed.
    #[error("failed to commit address import transaction")]
    Commit {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// Persist addresses to a store file that `SqliteAddressStore` can open.
///
/// The table, fulltext index and sync triggers are created when missing and
/// every record is written in one transaction. Records whose `id` already
/// exists are updated in place, so importing the same file twice is
/// idempotent. Returns the number of records written.
///
/// # Errors
/// Returns [`PersistAddressesError`] when any step fails; nothing is
/// committed in that case.
pub fn persist_addresses_to_sqlite(
    path: &Utf8Path,
    addresses: &[AddressInput],
) -> Result<usize, PersistAddressesError> {
    ensure_parent_dir(path).map_err(|source| PersistAddressesError::CreateDirectory {
        path: path.to_path_buf(),
        source,
    })?;
    let mut connection =
        Connection::open(path.as_std_path()).map_err(|source| PersistAddressesError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    let transaction = connection
        .transaction()
        .map_err(|source| PersistAddressesError::BeginTransaction { source })?;
    create_schema(&transaction).map_err(|source| PersistAddressesError::CreateSchema { source })?;
    persist_rows(&transaction, addresses)?;
    transaction
        .commit()
        .map_err(|source| PersistAddressesError::Commit { source })?;

    info!("imported {} addresses into {path}", addresses.len());
    Ok(addresses.len())
}

fn persist_rows(
    transaction: &Transaction<'_>,
    addresses: &[AddressInput],
) -> Result<(), PersistAddressesError> {
    if addresses.is_empty() {
        return Ok(());
    }

    // An upsert fires the update trigger, keeping the index in step.
    let mut statement = transaction
        .prepare(
            "INSERT INTO addresses (id, street, house_number, city, longitude, latitude)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                street = excluded.street,
                house_number = excluded.house_number,
                city = excluded.city,
                longitude = excluded.longitude,
                latitude = excluded.latitude",
        )
        .map_err(|source| PersistAddressesError::PrepareInsert { source })?;

    for (index, address) in addresses.iter().enumerate() {
        if !(-90.0..=90.0).contains(&address.latitude)
            || !(-180.0..=180.0).contains(&address.longitude)
        {
            return Err(PersistAddressesError::InvalidCoordinates {
                index,
                latitude: address.latitude,
                longitude: address.longitude,
            });
        }
        statement
            .execute((
                address.id,
                &address.street,
                &address.house_number,
                &address.city,
                address.longitude,
                address.latitude,
            ))
            .map_err(|source| PersistAddressesError::PersistRow { index, source })?;
    }
    Ok(())
}
