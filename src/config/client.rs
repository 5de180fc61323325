//! Client-side configuration (`client.toml`).
//!
//! ```toml
//! [client]
//! names = ["laptop", "phone"]
//! persistent_keepalive = 25
//!
//! [interface]
//! fw_mark = 51820
//! post_up = ["resolvectl dns %i 9.9.9.9"]
//! ```
//!
//! The `[interface]` hooks and firewall mark are copied into every
//! generated client configuration. Addresses and DNS come from the server,
//! so those keys are ignored here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::config::loader::ConfigError;
use crate::config::schema::InterfaceConfig;
use crate::config::validation::ValidationError;
use crate::wireguard::conf::Interface;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ClientConfig {
    pub client: ClientSection,
    pub interface: InterfaceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientSection {
    /// One configuration is requested per name; each lands in `<name>/<name>.conf`.
    pub names: Vec<String>,

    /// Seconds; 0 disables keepalives.
    pub persistent_keepalive: u16,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            persistent_keepalive: 25,
        }
    }
}

impl ClientConfig {
    /// Copy the local interface defaults over what the server returned.
    ///
    /// A zero firewall mark keeps the server's value.
    pub fn apply_defaults(&self, iface: &mut Interface) {
        if self.interface.fw_mark != 0 {
            iface.fw_mark = self.interface.fw_mark;
        }
        iface.pre_up = self.interface.pre_up.clone();
        iface.post_up = self.interface.post_up.clone();
        iface.pre_down = self.interface.pre_down.clone();
        iface.post_down = self.interface.post_down.clone();
    }
}

/// A client name doubles as a directory and file name.
pub fn validate_client_name(name: &str) -> Result<(), ValidationError> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new(
            "client.names",
            format!("invalid client name: {:?}", name),
        ))
    }
}

/// Parse and validate client configuration text.
pub fn parse_client_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content).map_err(ConfigError::Parse)?;
    let errors: Vec<ValidationError> = config
        .client
        .names
        .iter()
        .filter_map(|name| validate_client_name(name).err())
        .collect();
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }
    Ok(config)
}

pub fn load_client_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_client_config(&content)
}
