//! Peer admission subsystem.
//!
//! # Data Flow
//! ```text
//! admit request (raw key bytes)
//!     → store.rs (validate, dedup, allocate under one lock)
//!     → pool.rs (derive per-prefix addresses)
//!     → bounded queue → processor (durable write, later)
//!     → ClientConf back to the caller, immediately
//! ```
//!
//! # Design Decisions
//! - Admission never waits on the processor; a full queue is a rejection
//! - Rejections never modify state (see error.rs)

pub mod error;
pub mod pool;
pub mod store;

pub use error::AdmissionError;
pub use pool::{AddressPool, PeerAllocation, MAX_OFFSET};
pub use store::{AdmissionStore, StoreSettings};
