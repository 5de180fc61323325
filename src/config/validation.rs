//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacity > 0, tick > 0)
//! - Check that the tunnel can actually be described to clients
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ExchangeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ExchangeConfig;

/// Longest interface name Linux accepts (IFNAMSIZ - 1).
const MAX_INTERFACE_NAME: usize = 15;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `tunnel.dns`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub(crate) fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check a parsed configuration.
pub fn validate_config(config: &ExchangeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    let name = &config.tunnel.interface_name;
    let name_ok = !name.is_empty()
        && name.len() <= MAX_INTERFACE_NAME
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !name_ok {
        errors.push(ValidationError::new(
            "tunnel.interface_name",
            format!("invalid device name: {:?}", name),
        ));
    }

    match config.tunnel.endpoint {
        None => errors.push(ValidationError::new("tunnel.endpoint", "wireguard endpoint is required")),
        Some(endpoint) if endpoint.port() == 0 => {
            errors.push(ValidationError::new("tunnel.endpoint", "port must be nonzero"))
        }
        Some(_) => {}
    }

    if config.tunnel.dns.is_empty() {
        errors.push(ValidationError::new("tunnel.dns", "at least one DNS server is required"));
    }

    if config.interface.address.is_empty() {
        errors.push(ValidationError::new(
            "interface.address",
            "at least one address prefix is required",
        ));
    }

    if config.processor.queue_capacity == 0 {
        errors.push(ValidationError::new("processor.queue_capacity", "must be greater than 0"));
    }
    if config.processor.tick_ms == 0 {
        errors.push(ValidationError::new("processor.tick_ms", "must be greater than 0"));
    }

    if !config.service.unit_template.contains("{}") {
        errors.push(ValidationError::new(
            "service.unit_template",
            "must contain {} for the interface name",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
