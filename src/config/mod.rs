//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! server.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ExchangeConfig (validated, immutable)
//!     → lifecycle::startup builds the store and processor from it
//!
//! client.toml
//!     → client.rs (names, keepalive, interface hooks for wge-client)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod client;
pub mod loader;
pub mod schema;
pub mod validation;

pub use client::{load_client_config, ClientConfig};
pub use loader::{load_config, ConfigError};
pub use schema::ExchangeConfig;
pub use schema::InterfaceConfig;
pub use schema::ListenerConfig;
pub use schema::ObservabilityConfig;
pub use schema::ProcessorConfig;
pub use schema::ServiceConfig;
pub use schema::TunnelConfig;
