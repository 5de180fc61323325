//! WireGuard peer admission server library.

pub mod admission;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod processor;
pub mod service;
pub mod wireguard;

pub use admission::{AdmissionError, AdmissionStore};
pub use config::ExchangeConfig;
pub use http::AdmissionServer;
pub use lifecycle::{Coordinator, ShutdownOutcome};
pub use processor::Processor;
