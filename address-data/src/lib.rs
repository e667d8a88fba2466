//! Store lifecycle and store-file building for the address service.
//!
//! Responsibilities:
//! - Own the single live `SqliteAddressStore` and swap it for an uploaded
//!   file without exposing a half-replaced store to readers.
//! - Build valid store files from JSON address lists.
//!
//! Boundaries:
//! - Query semantics live in `address-core`; this crate only decides which
//!   store answers them.
//! - Everything here blocks; async callers run it on a blocking pool.
//!
//! Invariants:
//! - At most one live store handle and at most one replacement in flight.
//! - All transient files stay inside the data directory.
#![forbid(unsafe_code)]

pub mod ingest;
pub mod lifecycle;

pub use ingest::{
    AddressInput, PersistAddressesError, ReadAddressesError, persist_addresses_to_sqlite,
    read_addresses_json,
};
pub use lifecycle::{
    BACKUP_FILE, LIVE_FILE, LifecycleState, ReplaceError, RestoreError, SUCCESS_MESSAGE,
    StartupError, StoreManager, UPLOAD_FILE, UploadPermit, validate_upload_name,
};
