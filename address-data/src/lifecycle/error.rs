//! Error types raised while starting and replacing the live store.

use address_core::StoreInitError;
use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised when the manager starts up.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A filesystem operation on the data directory failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What the manager was doing.
        action: &'static str,
        /// Path involved in the failed operation.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The existing store file could not be opened.
    #[error(transparent)]
    Init(#[from] StoreInitError),
}

/// Errors raised while restoring the previous store after a bad upload.
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Removing the rejected file or renaming the backup failed.
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What the manager was doing.
        action: &'static str,
        /// Path involved in the failed operation.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The restored backup could not be reopened.
    #[error("failed to reinitialise database after restoring backup: {0}")]
    Reopen(#[source] StoreInitError),
}

/// Errors raised by a database replacement.
#[derive(Debug, Error)]
pub enum ReplaceError {
    /// The uploaded file name does not end in `.db`.
    #[error("Invalid file type. Only .db files are allowed.")]
    InvalidFileType,
    /// Another replacement holds the upload slot.
    #[error("a database upload is already in progress")]
    UploadInProgress,
    /// The manager has been shut down.
    #[error("address store has been shut down")]
    Closed,
    /// A filesystem step failed. Once the live store has been closed the
    /// manager stays in [`LifecycleState::Failed`](super::LifecycleState).
    #[error("failed to {action} {path}: {source}")]
    Io {
        /// What the manager was doing.
        action: &'static str,
        /// Path involved in the failed operation.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The upload was invalid and the previous store is live again.
    #[error("New DB are invalid, database restored from backup: {reason}")]
    Rejected {
        /// Why the uploaded file could not be opened.
        #[source]
        reason: StoreInitError,
    },
    /// The upload was invalid and there was no previous store to restore.
    #[error("New DB are invalid: {reason}")]
    RejectedWithoutBackup {
        /// Why the uploaded file could not be opened.
        #[source]
        reason: StoreInitError,
    },
    /// The upload was invalid and restoring the backup failed too. No store
    /// is live until an operator intervenes.
    #[error("New DB are invalid ({original}) and the backup could not be restored: {restore}")]
    Fatal {
        /// Why the uploaded file could not be opened.
        original: Box<StoreInitError>,
        /// Why the backup could not be brought back.
        #[source]
        restore: Box<RestoreError>,
    },
}

impl ReplaceError {
    pub(crate) fn io(action: &'static str, path: Utf8PathBuf, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path,
            source,
        }
    }
}
