//! Log-only service controller.

use async_trait::async_trait;

use crate::service::{unit_name, ServiceController, ServiceError};

/// Pretends every lifecycle operation succeeded.
pub struct SimulatedController {
    unit_template: String,
}

impl SimulatedController {
    pub fn new(unit_template: String) -> Self {
        Self { unit_template }
    }
}

#[async_trait]
impl ServiceController for SimulatedController {
    async fn enable_and_start(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        tracing::info!(unit = %unit, "Simulating enable and start");
        Ok(())
    }

    async fn restart(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        tracing::info!(unit = %unit, "Simulating restart");
        Ok(())
    }

    async fn disable_and_stop(&self, interface: &str) -> Result<(), ServiceError> {
        let unit = unit_name(&self.unit_template, interface);
        tracing::info!(unit = %unit, "Simulating disable and stop");
        Ok(())
    }
}
