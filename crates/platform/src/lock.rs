//! System-wide install lock
//!
//! A single file under `/run` is held with an exclusive `flock` for the whole
//! install. The holder writes the terminal it is running on into the file so
//! that other instances can tell the user where the install is happening.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use nix::fcntl::{Flock, FlockArg};
use subi_errors::{Error, PlatformError};

/// The lock file, not yet held
#[derive(Debug, Clone)]
pub struct InstallLock {
    path: PathBuf,
}

/// An exclusively held lock; released on drop
pub struct InstallLockGuard {
    file: Flock<File>,
    path: PathBuf,
}

fn lock_failed(path: &Path, message: impl ToString) -> Error {
    PlatformError::LockFailed {
        path: path.display().to_string(),
        message: message.to_string(),
    }
    .into()
}

impl InstallLock {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until the lock is held exclusively.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub async fn exclusive(&self) -> Result<InstallLockGuard, Error> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| Error::io_with_path(&e, &path))?;
            let file = Flock::lock(file, FlockArg::LockExclusive)
                .map_err(|(_, errno)| lock_failed(&path, errno))?;
            tracing::debug!(path = %path.display(), "install lock acquired");
            Ok(InstallLockGuard { file, path })
        })
        .await
        .map_err(|e| lock_failed(&self.path, e))?
    }

    /// What the current or last holder wrote into the lock file
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn read_content(&self) -> Result<Option<String>, Error> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_with_path(&e, &self.path)),
        }
    }
}

impl InstallLockGuard {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the lock file content
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_content(&mut self, content: &str) -> Result<(), Error> {
        rewrite(&mut self.file, content).map_err(|e| Error::io_with_path(&e, &self.path))
    }
}

fn rewrite(file: &mut File, content: &str) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content.as_bytes())?;
    file.flush()
}
