//! Durable configuration sink.
//!
//! # Responsibilities
//! - Write the interface header, replacing whatever was there
//! - Append one peer block per admitted peer
//! - Refuse to keep writing into a file others can read
//!
//! # Design Decisions
//! - Append-only after initialization; earlier blocks are never rewritten
//! - Every write is followed by `sync_data`
//! - The file is reopened for every write; no handle is kept between ticks

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Mode new configuration files are created with.
pub const CONF_FILE_MODE: u32 = 0o640;
/// Bits that must be set on the configuration file.
pub const REQUIRED_MODE_BITS: u32 = 0o600;
/// Bits that must not be set: the file holds the server's private key.
pub const FORBIDDEN_MODE_BITS: u32 = 0o007;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("file mode mismatch on {path}: {mode:o}")]
    ModeMismatch { path: PathBuf, mode: u32 },
}

/// Where the authoritative configuration is written.
pub trait ConfigSink: Send {
    /// Truncate and write the header block.
    fn initialize(&mut self, header: &str) -> Result<(), SinkError>;

    /// Append one block after everything written so far.
    fn append(&mut self, block: &str) -> Result<(), SinkError>;
}

/// A configuration file on disk, e.g. `/etc/wireguard/wg0.conf`.
#[derive(Debug, Clone)]
pub struct ConfFile {
    path: PathBuf,
}

impl ConfFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<dir>/<interface>.conf`
    pub fn for_interface(dir: &Path, interface: &str) -> Self {
        Self::new(dir.join(format!("{}.conf", interface)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current permission bits of the file.
    pub fn mode(&self) -> Result<u32, SinkError> {
        let meta = std::fs::metadata(&self.path).map_err(|e| self.io(e))?;
        Ok(meta.permissions().mode() & 0o777)
    }

    fn io(&self, source: io::Error) -> SinkError {
        SinkError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn verify_mode(&self, file: &File) -> Result<(), SinkError> {
        let mode = file.metadata().map_err(|e| self.io(e))?.permissions().mode() & 0o777;
        if mode & REQUIRED_MODE_BITS != REQUIRED_MODE_BITS || mode & FORBIDDEN_MODE_BITS != 0 {
            return Err(SinkError::ModeMismatch {
                path: self.path.clone(),
                mode,
            });
        }
        Ok(())
    }

    fn write_synced(&self, mut file: File, text: &str) -> Result<(), SinkError> {
        file.write_all(text.as_bytes()).map_err(|e| self.io(e))?;
        file.sync_data().map_err(|e| self.io(e))
    }
}

impl ConfigSink for ConfFile {
    fn initialize(&mut self, header: &str) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(CONF_FILE_MODE)
            .open(&self.path)
            .map_err(|e| self.io(e))?;

        // An existing file keeps its old mode; check before the key lands in it.
        self.verify_mode(&file)?;
        self.write_synced(file, header)
    }

    fn append(&mut self, block: &str) -> Result<(), SinkError> {
        let file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;
        self.write_synced(file, block)
    }
}
