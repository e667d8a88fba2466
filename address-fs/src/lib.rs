//! Capability-scoped access to the service's data directory.
//!
//! Every file the lifecycle manager touches (live store, staged upload,
//! backup and their SQLite sidecars) lives directly inside one directory.
//! [`DataDir`] holds a `cap-std` handle to it so renames and removals can
//! never escape that directory.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Handle to a directory plus the ambient path it was opened from.
#[derive(Debug)]
pub struct DataDir {
    dir: fs_utf8::Dir,
    root: Utf8PathBuf,
}

impl DataDir {
    /// Open `root`, creating it and any missing parents first.
    ///
    /// # Errors
    /// Returns the I/O error from creating or opening the directory.
    pub fn open_or_create(root: impl Into<Utf8PathBuf>) -> io::Result<Self> {
        let root = root.into();
        let (base, relative) = base_dir_and_relative(&root)?;
        let dir = if relative.as_str().is_empty() {
            base
        } else {
            base.create_dir_all(&relative)?;
            base.open_dir(&relative)?
        };
        Ok(Self { dir, root })
    }

    /// Ambient path of the directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Ambient path of `name` inside the directory.
    #[must_use]
    pub fn path_of(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// Whether `name` exists. A missing entry is `Ok(false)`.
    ///
    /// # Errors
    /// Returns any stat error other than `NotFound`.
    pub fn exists(&self, name: &str) -> io::Result<bool> {
        match self.dir.symlink_metadata(name) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Remove `name`, returning whether anything was removed.
    ///
    /// # Errors
    /// Returns any removal error other than `NotFound`.
    pub fn remove_if_exists(&self, name: &str) -> io::Result<bool> {
        match self.dir.remove_file(name) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Rename `from` to `to`, replacing `to` if present.
    ///
    /// # Errors
    /// Returns the I/O error from the rename.
    pub fn rename(&self, from: &str, to: &str) -> io::Result<()> {
        self.dir.rename(from, &self.dir, to)
    }

    /// Create (or truncate) `name` for writing.
    ///
    /// # Errors
    /// Returns the I/O error from creating the file.
    pub fn create_file(&self, name: &str) -> io::Result<std::fs::File> {
        self.dir.create(name).map(fs_utf8::File::into_std)
    }
}

/// Open a UTF-8 file path for reading using ambient authority.
///
/// # Errors
/// Returns the I/O error from opening the file.
pub fn open_file(path: &Utf8Path) -> io::Result<std::fs::File> {
    fs_utf8::File::open_ambient(path, ambient_authority()).map(fs_utf8::File::into_std)
}

/// Create the parent directory of `path` if it is missing.
///
/// # Errors
/// Returns the I/O error from creating the directory.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() {
        return Ok(());
    }
    let (base, relative) = base_dir_and_relative(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Split a path into an ambient base directory and the suffix below it.
///
/// Absolute paths resolve from the filesystem root (or the drive prefix on
/// Windows); relative paths resolve from the current directory.
///
/// # Errors
/// Returns an error for non-UTF-8 components or when the base cannot be
/// opened.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let base = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let drive = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(drive).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::new(),
    };
    let relative = if base.as_str().is_empty() {
        path.to_path_buf()
    } else {
        path.strip_prefix(&base)
            .map_err(|_| io::Error::other("failed to strip base from path"))?
            .to_path_buf()
    };
    let opened = if base.as_str().is_empty() {
        Utf8Path::new(".")
    } else {
        base.as_path()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(opened, ambient_authority())?;
    Ok((dir, relative))
}
