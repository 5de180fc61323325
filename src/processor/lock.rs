//! Cross-process instance lock.
//!
//! Two servers writing the same interface file would interleave peer blocks
//! and hand out the same addresses twice. The lock is an `flock` on a
//! dedicated file, so it excludes other processes as well as other tasks.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    /// Another process holds the lock.
    #[error("another instance holds {0}")]
    Contended(PathBuf),

    #[error("failed to open lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held for as long as this process owns the interface. Released on drop.
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// `<dir>/.wge-<interface>`
    pub fn path_for(dir: &Path, interface: &str) -> PathBuf {
        dir.join(format!(".wge-{}", interface))
    }

    /// Take the lock without waiting.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Self, LockError> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| LockError::Io {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive().map_err(|e| {
            if e.kind() == fs2::lock_contended_error().kind() {
                LockError::Contended(path.clone())
            } else {
                LockError::Io {
                    path: path.clone(),
                    source: e,
                }
            }
        })?;

        tracing::debug!(path = %path.display(), "Instance lock acquired");
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release instance lock");
        } else {
            tracing::debug!(path = %self.path.display(), "Instance lock released");
        }
    }
}
