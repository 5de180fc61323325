//! systemd-backed service controller.
//!
//! Drives the unit through `systemctl`. Each successful job is followed by a
//! settle delay so the interface is up (or down) before the next operation.

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

use crate::config::schema::ServiceConfig;
use crate::service::{unit_name, ServiceController, ServiceError};

pub struct SystemctlController {
    program: String,
    unit_template: String,
    settle: Duration,
}

impl SystemctlController {
    pub fn new(config: &ServiceConfig) -> Self {
        Self {
            program: config.systemctl_path.clone(),
            unit_template: config.unit_template.clone(),
            settle: Duration::from_millis(config.settle_ms),
        }
    }

    async fn run(&self, operation: &'static str, args: &[&str], unit: &str) -> Result<(), ServiceError> {
        let output = Command::new(&self.program)
            .args(args)
            .arg(unit)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ServiceError::Rejected {
                operation,
                unit: unit.to_string(),
                detail: format!("{}: {}", output.status, stderr.trim()),
            });
        }

        tracing::info!(unit = %unit, operation, "Service job dispatched");
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

#[async_trait]
impl ServiceController for SystemctlController {
    async fn enable_and_start(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        self.run("enable", &["enable", "--now"], &unit).await
    }

    async fn restart(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        self.run("restart", &["restart"], &unit).await
    }

    async fn disable_and_stop(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        self.run("disable", &["disable", "--now"], &unit).await
    }
}
