//! Network-service lifecycle control.
//!
//! # Responsibilities
//! - Enable and start the tunnel's service unit at startup
//! - Restart it so newly written peers take effect
//! - Disable and stop it when the on-disk state can no longer be trusted
//!
//! # Design Decisions
//! - The processor only sees the [`ServiceController`] trait; which backend
//!   runs is a configuration choice
//! - `simulated` logs and succeeds, for hosts without a service manager
//! - `systemctl` drives `wg-quick@<interface>.service`

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::schema::{ServiceConfig, ServiceMode};

pub mod simulated;
pub mod systemctl;

pub use simulated::SimulatedController;
pub use systemctl::SystemctlController;

/// Errors reported by a service controller.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service manager could not be reached or spawned.
    #[error("failed to run service manager: {0}")]
    Spawn(#[from] std::io::Error),

    /// The service manager rejected the operation.
    #[error("{operation} of {unit} failed: {detail}")]
    Rejected {
        operation: &'static str,
        unit: String,
        detail: String,
    },
}

/// Lifecycle operations on the interface's service unit.
///
/// `interface` is the WireGuard interface name; implementations map it to
/// their own unit naming.
#[async_trait]
pub trait ServiceController: Send + Sync {
    async fn enable_and_start(&self, interface: &str) -> Result<(), ServiceError>;

    async fn restart(&self, interface: &str) -> Result<(), ServiceError>;

    async fn disable_and_stop(&self, interface: &str) -> Result<(), ServiceError>;
}

/// Expand the configured unit template (`{}` is the interface name).
pub fn unit_name(template: &str, interface: &str) -> String {
    template.replace("{}", interface)
}

/// Build the controller selected by configuration.
pub fn from_config(config: &ServiceConfig) -> Arc<dyn ServiceController> {
    match config.mode {
        ServiceMode::Simulated => Arc::new(SimulatedController::new(config.unit_template.clone())),
        ServiceMode::Systemctl => Arc::new(SystemctlController::new(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_name() {
        assert_eq!(unit_name("wg-quick@{}.service", "wg0"), "wg-quick@wg0.service");
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::Rejected {
            operation: "restart",
            unit: "wg-quick@wg0.service".into(),
            detail: "exit status 1".into(),
        };
        assert_eq!(
            err.to_string(),
            "restart of wg-quick@wg0.service failed: exit status 1"
        );
    }
}
