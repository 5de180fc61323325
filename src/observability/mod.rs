//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and gauges via `metrics`)
//!
//! Consumers:
//!     → stdout (fmt layer, filtered by RUST_LOG or config)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields, not formatted strings, for anything worth grepping
//! - Request ID flows from the HTTP layer into the handler's log lines
//! - Metric calls are no-ops until a recorder is installed, so tests and
//!   library users pay nothing

pub mod logging;
pub mod metrics;
