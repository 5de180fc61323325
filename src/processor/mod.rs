//! Processor subsystem: durable peer writes and service lifecycle.
//!
//! # Data Flow
//! ```text
//! admission store ──PendingWrite──▶ bounded queue
//!                                        │ (one per tick)
//!                                        ▼
//!                  runner.rs ──▶ sink.rs (append [Peer] block)
//!                      │
//!                      └──▶ service controller (debounced restart)
//! ```
//!
//! # States
//! ```text
//! Starting → Running → Draining → Stopped
//!     └──────────┴──▶ Failed
//! ```
//!
//! # Design Decisions
//! - Restarts are debounced: many admissions, at most one restart per window
//! - Any failure after startup cancels the whole process; the persisted
//!   peer set must never drift from what the service runs
//! - The instance lock is released on every exit path

use ipnet::IpNet;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::service::ServiceError;
use crate::wireguard::conf::Peer;
use crate::wireguard::keys::{PresharedKey, WgPublicKey};

pub mod lock;
pub mod runner;
pub mod sink;

pub use lock::{InstanceLock, LockError};
pub use runner::{Processor, ProcessorSettings};
pub use sink::{ConfFile, ConfigSink, SinkError};

/// One admitted peer waiting to be written to disk.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    /// Allocation index the peer's addresses were derived from.
    pub index: usize,
    pub allowed_ips: Vec<IpNet>,
    pub public_key: WgPublicKey,
    pub preshared_key: Option<PresharedKey>,
}

impl PendingWrite {
    /// The server-side `[Peer]` block for this peer.
    pub fn to_peer(&self) -> Peer {
        Peer {
            endpoint: None,
            allowed_ips: self.allowed_ips.clone(),
            persistent_keepalive: None,
            public_key: self.public_key,
            preshared_key: self.preshared_key.clone(),
        }
    }
}

/// Where the processor is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Starting,
    Running,
    Draining,
    Stopped,
    Failed,
}

impl fmt::Display for ProcessorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessorState::Starting => "starting",
            ProcessorState::Running => "running",
            ProcessorState::Draining => "draining",
            ProcessorState::Stopped => "stopped",
            ProcessorState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Fatal processor errors. Each one cancels the process.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("another instance is currently running (lock {0})")]
    LockContention(PathBuf),

    #[error("instance lock failure: {0}")]
    Lock(#[source] LockError),

    #[error("failed to initialize server configuration: {0}")]
    Initialize(#[source] SinkError),

    #[error("failed to enable service: {0}")]
    Lifecycle(#[source] ServiceError),

    #[error("failed to persist peer: {0}")]
    DurableWrite(#[source] SinkError),

    #[error("failed to restart service: {0}")]
    Restart(#[source] ServiceError),
}

impl From<LockError> for ProcessorError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Contended(path) => ProcessorError::LockContention(path),
            other => ProcessorError::Lock(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_write_renders_server_peer() {
        let write = PendingWrite {
            index: 1,
            allowed_ips: vec!["10.8.0.2/32".parse().unwrap(), "fd00:8::2/128".parse().unwrap()],
            public_key: WgPublicKey::from_bytes([0u8; 32]),
            preshared_key: None,
        };
        assert_eq!(
            write.to_peer().to_string(),
            "[Peer]\n\
             AllowedIPs = 10.8.0.2/32, fd00:8::2/128\n\
             PublicKey = AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=\n\
             \n"
        );
    }

    #[test]
    fn test_contended_lock_maps_to_lock_contention() {
        let err = ProcessorError::from(LockError::Contended(PathBuf::from("/tmp/.wge-wg0")));
        assert!(matches!(err, ProcessorError::LockContention(_)));
        assert!(err.to_string().contains("another instance"));
    }
}
