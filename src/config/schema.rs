//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! exchange server. All types derive Serde traits for deserialization from
//! the TOML config file.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Root configuration for the exchange server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Admission endpoint listener (bind address, TLS).
    pub listener: ListenerConfig,

    /// Public tunnel parameters handed to clients.
    pub tunnel: TunnelConfig,

    /// The server's `[Interface]` section.
    pub interface: InterfaceConfig,

    /// Durable writer settings.
    pub processor: ProcessorConfig,

    /// Service manager integration.
    pub service: ServiceConfig,

    /// Process lifetime.
    pub lifecycle: LifecycleConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:7777").
    pub bind_address: String,

    /// Optional TLS configuration. Plain HTTP when absent.
    pub tls: Option<TlsConfig>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:7777".to_string(),
            tls: None,
            request_timeout_secs: 10,
            max_body_bytes: 4 * 1024,
            shutdown_grace_secs: 5,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Tunnel parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// WireGuard interface name; also names the config file and the unit.
    pub interface_name: String,

    /// Public `host:port` of the WireGuard listener. Its port becomes the
    /// server's `ListenPort`.
    pub endpoint: Option<SocketAddr>,

    /// DNS servers pushed to clients.
    pub dns: Vec<IpAddr>,

    /// Firewall mark written into client configurations.
    pub client_fw_mark: u32,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            interface_name: "wg0".to_string(),
            endpoint: None,
            dns: Vec::new(),
            client_fw_mark: crate::wireguard::DEFAULT_FW_MARK,
        }
    }
}

/// The server's own interface.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct InterfaceConfig {
    /// Server addresses with their prefixes (e.g. "10.8.0.1/24"). Peers are
    /// allocated from these.
    pub address: Vec<IpNet>,

    /// DNS for the server itself; usually empty.
    pub dns: Vec<IpAddr>,

    pub fw_mark: u32,
    pub pre_up: Vec<String>,
    pub post_up: Vec<String>,
    pub pre_down: Vec<String>,
    pub post_down: Vec<String>,
}

/// Processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Directory holding `<interface>.conf`.
    pub config_dir: PathBuf,

    /// Directory for the instance lock file. Defaults to the system temp dir.
    pub lock_dir: Option<PathBuf>,

    /// Pending writes buffered between the store and the processor.
    pub queue_capacity: usize,

    /// Queue poll interval in milliseconds.
    pub tick_ms: u64,

    /// Minimum seconds between two service restarts.
    pub restart_debounce_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/wireguard"),
            lock_dir: None,
            queue_capacity: 20,
            tick_ms: 1000,
            restart_debounce_secs: 60,
        }
    }
}

impl ProcessorConfig {
    pub fn lock_dir(&self) -> PathBuf {
        self.lock_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Which service controller backend to use.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    /// Log only.
    #[default]
    Simulated,
    /// Drive systemd through `systemctl`.
    Systemctl,
}

/// Service manager configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub mode: ServiceMode,

    /// Unit name; `{}` is replaced by the interface name.
    pub unit_template: String,

    pub systemctl_path: String,

    /// Wait after each dispatched job, in milliseconds.
    pub settle_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: ServiceMode::Simulated,
            unit_template: "wg-quick@{}.service".to_string(),
            systemctl_path: "systemctl".to_string(),
            settle_ms: 2000,
        }
    }
}

/// Process lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Stop after this many seconds. 0 runs until signalled.
    pub ttl_secs: u64,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
