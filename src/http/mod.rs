//! HTTP transport for the admission store.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (axum-server, optional rustls)
//!     → request.rs (request ID)
//!     → POST /add-peer → AdmissionStore::admit_peer
//!     → response.rs (error → status code)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod tls;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{build_router, AdmissionServer, AdmitRequest, AppState, HealthResponse, ServerError};
