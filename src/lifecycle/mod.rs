//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → key pair → store + processor sharing one bounded queue
//!
//! Shutdown (shutdown.rs):
//!     Signal / TTL / task failure → cancel token → wait for tasks → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → forwarded to the coordinator
//!     second delivery → forced exit
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then core, then listener
//! - One cancellation token for the whole process
//! - A second signal skips the drain

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Coordinator, ShutdownOutcome};
pub use signals::TermSignal;
pub use startup::{build, Services, StartupError};
