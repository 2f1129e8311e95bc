//! core::lock
//!
//! Best-effort mutual exclusion for restore runs.
//!
//! # Design
//!
//! Concurrent restores into the same repository are the one concurrency
//! hazard in this tool, typically from overlapping cron invocations
//! sweeping the same bundle directory. The guard is a plain
//! create-if-absent marker file: if the marker already exists, another
//! restore is (or recently was) running and this invocation should back
//! off without doing any work - a polite no-op, not an error.
//!
//! # Invariants
//!
//! - The marker is removed unconditionally when the guard is dropped
//! - Acquisition never blocks or waits
//!
//! # Example
//!
//! ```
//! use bundlework::core::lock::{LockError, RestoreLock};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let marker = dir.path().join("restore.lock");
//!
//! let lock = RestoreLock::acquire(&marker).unwrap();
//! assert!(matches!(
//!     RestoreLock::acquire(&marker),
//!     Err(LockError::AlreadyHeld { .. })
//! ));
//!
//! drop(lock);
//! assert!(RestoreLock::acquire(&marker).is_ok());
//! ```

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from acquiring the restore lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The marker file already exists.
    #[error("lock file {path} already exists")]
    AlreadyHeld {
        /// The marker file that was found
        path: PathBuf,
    },

    /// The marker file could not be created for another reason.
    #[error("failed to create lock file: {0}")]
    CreateFailed(#[from] io::Error),
}

/// A held restore lock.
///
/// The marker file is removed when this guard is dropped, including on
/// panic (RAII pattern).
#[derive(Debug)]
pub struct RestoreLock {
    path: PathBuf,
}

impl RestoreLock {
    /// Attempt to create the marker file.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyHeld`] if the marker already exists
    /// - [`LockError::CreateFailed`] on any other filesystem error
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(Self {
                path: path.to_path_buf(),
            }),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Err(LockError::AlreadyHeld {
                path: path.to_path_buf(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// The path of the marker file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RestoreLock {
    fn drop(&mut self) {
        // Removal is best-effort; a marker left behind by an unkillable
        // filesystem error must be cleaned up by the operator anyway.
        let _ = std::fs::remove_file(&self.path);
    }
}
