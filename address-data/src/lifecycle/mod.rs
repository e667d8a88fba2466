//! Ownership and hot replacement of the live address store.
//!
//! The data directory holds three well-known files: the live store
//! [`LIVE_FILE`], a staged upload [`UPLOAD_FILE`] and, only while a
//! replacement runs, the previous store [`BACKUP_FILE`]. SQLite's `-wal`
//! and `-shm` sidecars travel with their main file.
//!
//! Queries take the read side of the handle lock. A replacement holds the
//! write side from closing the old store until a store is live again, so no
//! reader ever sees a store that is being swapped.

use std::{
    io::{self, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use address_core::{
    Address, AddressStore, AdvancedQuery, FulltextQuery, QueryError, ReverseQuery, SearchHit,
    SqliteAddressStore, StoreInitError,
};
use address_fs::DataDir;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, error, info, warn};
use parking_lot::{Mutex, RwLock};

mod error;

pub use error::{ReplaceError, RestoreError, StartupError};

/// File name of the live store inside the data directory.
pub const LIVE_FILE: &str = "data.db";
/// File name an upload is streamed to before it is committed.
pub const UPLOAD_FILE: &str = "upload.db";
/// File name the previous store is parked under during a replacement.
pub const BACKUP_FILE: &str = "backup.db";
/// Reported to the operator after a committed replacement.
pub const SUCCESS_MESSAGE: &str = "Database updated successfully";

const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Where the manager is in the store lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No store file has been opened yet.
    Uninitialized,
    /// A store is open and answering queries.
    Live,
    /// The previous store is closed and its replacement is being installed.
    SwapPending,
    /// The replacement was rejected and the backup is being reopened.
    RolledBack,
    /// The manager was shut down.
    Closed,
    /// A replacement left no usable store; an operator must intervene.
    Failed,
}

/// Exclusive right to stage and commit one replacement.
///
/// Dropping the permit frees the slot for the next upload.
#[derive(Debug)]
pub struct UploadPermit {
    slot: Arc<AtomicBool>,
}

impl Drop for UploadPermit {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::Release);
    }
}

/// Check that an uploaded file name ends in `.db`, ignoring case.
///
/// # Errors
/// Returns [`ReplaceError::InvalidFileType`] for any other name.
pub fn validate_upload_name(file_name: &str) -> Result<(), ReplaceError> {
    let suffix = file_name.get(file_name.len().saturating_sub(3)..);
    if suffix.is_some_and(|ext| ext.eq_ignore_ascii_case(".db")) {
        Ok(())
    } else {
        Err(ReplaceError::InvalidFileType)
    }
}

/// Owner of the single live store handle.
#[derive(Debug)]
pub struct StoreManager {
    dir: DataDir,
    live: RwLock<Option<SqliteAddressStore>>,
    state: Mutex<LifecycleState>,
    uploading: Arc<AtomicBool>,
}

impl StoreManager {
    /// Open the store under `data_dir`, creating the directory if needed.
    ///
    /// A backup left behind by an interrupted replacement is removed once
    /// the live store has opened. When the live file is missing or does not
    /// open, the backup is moved back in its place. With neither file the
    /// manager starts [`LifecycleState::Uninitialized`] and the first upload
    /// installs a store.
    ///
    /// # Errors
    /// Returns [`StartupError`] when the directory cannot be prepared or the
    /// existing store fails to open.
    pub fn initialise(data_dir: impl Into<Utf8PathBuf>) -> Result<Self, StartupError> {
        let root = data_dir.into();
        let dir =
            DataDir::open_or_create(root.clone()).map_err(|source| StartupError::Io {
                action: "create data directory",
                path: root,
                source,
            })?;
        let store = recover_store(&dir)?;
        let state = if store.is_some() {
            LifecycleState::Live
        } else {
            LifecycleState::Uninitialized
        };

        Ok(Self {
            dir,
            live: RwLock::new(store),
            state: Mutex::new(state),
            uploading: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Directory holding the store files.
    #[must_use]
    pub fn data_dir(&self) -> &Utf8Path {
        self.dir.root()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Run `query` against the live store under the read lock.
    ///
    /// # Errors
    /// Returns [`QueryError::Closed`] when no store is live, otherwise
    /// whatever `query` returns.
    pub fn with_store<T>(
        &self,
        query: impl FnOnce(&SqliteAddressStore) -> Result<T, QueryError>,
    ) -> Result<T, QueryError> {
        let live = self.live.read();
        live.as_ref().map_or(Err(QueryError::Closed), query)
    }

    /// Claim the upload slot for a file called `file_name`.
    ///
    /// # Errors
    /// Returns [`ReplaceError::InvalidFileType`] for names not ending in
    /// `.db`, [`ReplaceError::Closed`] after shutdown and
    /// [`ReplaceError::UploadInProgress`] while another upload holds the
    /// slot.
    pub fn begin_upload(&self, file_name: &str) -> Result<UploadPermit, ReplaceError> {
        validate_upload_name(file_name)?;
        if self.state() == LifecycleState::Closed {
            return Err(ReplaceError::Closed);
        }
        self.uploading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ReplaceError::UploadInProgress)?;
        Ok(UploadPermit {
            slot: Arc::clone(&self.uploading),
        })
    }

    /// Create (or truncate) the staging file for the permit holder.
    ///
    /// # Errors
    /// Returns [`ReplaceError::Io`] when the file cannot be created.
    pub fn create_staging_file(
        &self,
        _permit: &UploadPermit,
    ) -> Result<std::fs::File, ReplaceError> {
        let path = self.dir.path_of(UPLOAD_FILE);
        self.dir
            .create_file(UPLOAD_FILE)
            .map_err(|source| ReplaceError::io("create upload file", path, source))
    }

    /// Stream `reader` into the staging file, returning the bytes written.
    ///
    /// The live store is not touched. A failed write removes the partial
    /// file.
    ///
    /// # Errors
    /// Returns [`ReplaceError::Io`] when creating or writing the file fails.
    pub fn stage<R: Read>(
        &self,
        permit: &UploadPermit,
        mut reader: R,
    ) -> Result<u64, ReplaceError> {
        let mut file = self.create_staging_file(permit)?;
        let written = io::copy(&mut reader, &mut file)
            .and_then(|written| file.sync_all().map(|()| written));
        match written {
            Ok(bytes) => {
                info!("staged {bytes} bytes at {}", self.dir.path_of(UPLOAD_FILE));
                Ok(bytes)
            }
            Err(source) => {
                self.discard_staged(permit);
                Err(ReplaceError::io(
                    "write upload file",
                    self.dir.path_of(UPLOAD_FILE),
                    source,
                ))
            }
        }
    }

    /// Remove a partially written staging file.
    pub fn discard_staged(&self, _permit: &UploadPermit) {
        if let Err(err) = self.dir.remove_if_exists(UPLOAD_FILE) {
            warn!(
                "failed to remove staged upload {}: {err}",
                self.dir.path_of(UPLOAD_FILE)
            );
        }
    }

    /// Swap the staged upload in as the live store.
    ///
    /// Waits for in-flight queries, closes the live store, parks it as the
    /// backup and opens the upload in its place. An upload that fails to
    /// open is deleted and the backup is reopened.
    ///
    /// # Errors
    /// - [`ReplaceError::Closed`] after shutdown.
    /// - [`ReplaceError::Io`] when a rename fails; the manager is left
    ///   [`LifecycleState::Failed`] without a live store.
    /// - [`ReplaceError::Rejected`] when the upload was invalid and the
    ///   previous store is live again.
    /// - [`ReplaceError::RejectedWithoutBackup`] when the upload was invalid
    ///   and there was no previous store.
    /// - [`ReplaceError::Fatal`] when the backup could not be restored.
    pub fn commit_staged(&self, _permit: &UploadPermit) -> Result<(), ReplaceError> {
        let mut live = self.live.write();
        if self.state() == LifecycleState::Closed {
            return Err(ReplaceError::Closed);
        }
        if let Some(store) = live.take() {
            if let Err(err) = store.close() {
                warn!("closing the live store reported an error: {err}");
            }
            info!("current database closed");
        }
        self.set_state(LifecycleState::SwapPending);

        let live_path = self.dir.path_of(LIVE_FILE);
        let backed_up = self
            .dir
            .exists(LIVE_FILE)
            .map_err(|source| self.fail(ReplaceError::io("inspect", live_path.clone(), source)))?;
        if backed_up {
            move_with_sidecars(&self.dir, LIVE_FILE, BACKUP_FILE).map_err(|source| {
                self.fail(ReplaceError::io(
                    "back up current database",
                    live_path.clone(),
                    source,
                ))
            })?;
            info!("current database backed up to {}", self.dir.path_of(BACKUP_FILE));
        }
        move_with_sidecars(&self.dir, UPLOAD_FILE, LIVE_FILE).map_err(|source| {
            self.fail(ReplaceError::io(
                "replace database file",
                self.dir.path_of(UPLOAD_FILE),
                source,
            ))
        })?;

        match SqliteAddressStore::open(&live_path) {
            Ok(store) => {
                *live = Some(store);
                self.set_state(LifecycleState::Live);
                remove_backup(&self.dir);
                info!("new database initialised at {live_path}");
                Ok(())
            }
            Err(reason) if backed_up => self.roll_back(&mut live, reason),
            Err(reason) => {
                warn!("uploaded database rejected: {reason}");
                if let Err(err) = remove_with_sidecars(&self.dir, LIVE_FILE) {
                    warn!("failed to remove rejected database {live_path}: {err}");
                }
                self.set_state(LifecycleState::Uninitialized);
                Err(ReplaceError::RejectedWithoutBackup { reason })
            }
        }
    }

    /// Stage `reader` and commit it in one call.
    ///
    /// # Errors
    /// Any error from [`Self::begin_upload`], [`Self::stage`] or
    /// [`Self::commit_staged`].
    pub fn replace<R: Read>(&self, file_name: &str, reader: R) -> Result<(), ReplaceError> {
        let permit = self.begin_upload(file_name)?;
        self.stage(&permit, reader)?;
        self.commit_staged(&permit)
    }

    /// Close the live store and refuse further work.
    ///
    /// # Errors
    /// Returns the error SQLite reported while closing the connection.
    pub fn close(&self) -> Result<(), rusqlite::Error> {
        let mut live = self.live.write();
        self.set_state(LifecycleState::Closed);
        live.take().map_or(Ok(()), SqliteAddressStore::close)
    }

    fn roll_back(
        &self,
        live: &mut Option<SqliteAddressStore>,
        reason: StoreInitError,
    ) -> Result<(), ReplaceError> {
        warn!("uploaded database rejected, restoring backup: {reason}");
        let live_path = self.dir.path_of(LIVE_FILE);
        let restored = remove_with_sidecars(&self.dir, LIVE_FILE)
            .map_err(|source| RestoreError::Io {
                action: "remove rejected database",
                path: live_path.clone(),
                source,
            })
            .and_then(|()| {
                move_with_sidecars(&self.dir, BACKUP_FILE, LIVE_FILE).map_err(|source| {
                    RestoreError::Io {
                        action: "restore backup",
                        path: self.dir.path_of(BACKUP_FILE),
                        source,
                    }
                })
            })
            .and_then(|()| {
                self.set_state(LifecycleState::RolledBack);
                SqliteAddressStore::open(&live_path).map_err(RestoreError::Reopen)
            });

        match restored {
            Ok(store) => {
                *live = Some(store);
                self.set_state(LifecycleState::Live);
                info!("previous database restored at {live_path}");
                Err(ReplaceError::Rejected { reason })
            }
            Err(restore) => {
                error!("restoring the previous database failed: {restore}");
                self.set_state(LifecycleState::Failed);
                Err(ReplaceError::Fatal {
                    original: Box::new(reason),
                    restore: Box::new(restore),
                })
            }
        }
    }

    fn fail(&self, err: ReplaceError) -> ReplaceError {
        error!("database replacement failed, no store is live: {err}");
        self.set_state(LifecycleState::Failed);
        err
    }

    fn set_state(&self, next: LifecycleState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!("store lifecycle {:?} -> {next:?}", *state);
            *state = next;
        }
    }
}

impl AddressStore for StoreManager {
    fn fulltext_search(&self, query: &FulltextQuery) -> Result<Vec<Address>, QueryError> {
        self.with_store(|store| store.fulltext_search(query))
    }

    fn find_in_radius(&self, query: &ReverseQuery) -> Result<Vec<Address>, QueryError> {
        self.with_store(|store| store.find_in_radius(query))
    }

    fn advanced_search(&self, query: &AdvancedQuery) -> Result<Vec<SearchHit>, QueryError> {
        self.with_store(|store| store.advanced_search(query))
    }
}

fn sidecar(name: &str, suffix: &str) -> String {
    format!("{name}{suffix}")
}

/// Rename `from` and its sidecars to `to`. Stale sidecars of `to` that
/// have no counterpart are removed.
fn move_with_sidecars(dir: &DataDir, from: &str, to: &str) -> io::Result<()> {
    dir.rename(from, to)?;
    for suffix in SIDECAR_SUFFIXES {
        let source = sidecar(from, suffix);
        let target = sidecar(to, suffix);
        if dir.exists(&source)? {
            dir.rename(&source, &target)?;
        } else {
            dir.remove_if_exists(&target)?;
        }
    }
    Ok(())
}

fn remove_with_sidecars(dir: &DataDir, name: &str) -> io::Result<()> {
    dir.remove_if_exists(name)?;
    for suffix in SIDECAR_SUFFIXES {
        dir.remove_if_exists(&sidecar(name, suffix))?;
    }
    Ok(())
}

/// Open whatever store an earlier run left in `dir`.
fn recover_store(dir: &DataDir) -> Result<Option<SqliteAddressStore>, StartupError> {
    let inspect = |name: &str| {
        dir.exists(name).map_err(|source| StartupError::Io {
            action: "inspect",
            path: dir.path_of(name),
            source,
        })
    };
    let live_path = dir.path_of(LIVE_FILE);
    let has_backup = inspect(BACKUP_FILE)?;
    if inspect(LIVE_FILE)? {
        match SqliteAddressStore::open(&live_path) {
            Ok(store) => {
                remove_backup(dir);
                return Ok(Some(store));
            }
            Err(err) if has_backup => {
                warn!("database at {live_path} does not open, restoring backup: {err}");
                remove_with_sidecars(dir, LIVE_FILE).map_err(|source| StartupError::Io {
                    action: "remove unusable database",
                    path: live_path.clone(),
                    source,
                })?;
            }
            Err(err) => return Err(err.into()),
        }
    } else if !has_backup {
        warn!("no database at {live_path}; queries fail until one is uploaded");
        return Ok(None);
    }

    move_with_sidecars(dir, BACKUP_FILE, LIVE_FILE).map_err(|source| StartupError::Io {
        action: "restore backup",
        path: dir.path_of(BACKUP_FILE),
        source,
    })?;
    info!("backup restored to {live_path}");
    Ok(Some(SqliteAddressStore::open(&live_path)?))
}

/// Opportunistic cleanup: failures are logged, never returned.
fn remove_backup(dir: &DataDir) {
    let path = dir.path_of(BACKUP_FILE);
    match dir.exists(BACKUP_FILE) {
        Ok(true) => match remove_with_sidecars(dir, BACKUP_FILE) {
            Ok(()) => info!("backup file {path} removed"),
            Err(err) => warn!("failed to remove backup file {path}: {err}"),
        },
        Ok(false) => debug!("no backup file found to remove"),
        Err(err) => warn!("error checking for backup file {path}: {err}"),
    }
}
