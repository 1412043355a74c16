//! Single-writer lock on the output base directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::PublishError;

/// Held for the whole run. Dropping it removes the lock file.
#[derive(Debug)]
pub struct PublishLock {
    path: PathBuf,
}

impl PublishLock {
    /// Create `path` exclusively.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Locked`] when another run holds the lock, or
    /// [`PublishError::Io`] for any other failure.
    pub fn acquire(path: &Path) -> Result<Self, PublishError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(PublishError::Locked(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "Acquired output lock");
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PublishLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
