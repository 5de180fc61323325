//! WireGuard configuration blocks and their text rendering.
//!
//! Each entity renders itself through `Display` into the INI dialect read by
//! `wg-quick`. Rendering is deterministic: fields are emitted in a fixed
//! order, empty or zero-valued optional fields are skipped, and every block
//! is terminated by one empty line so that blocks can be appended to a file
//! one at a time.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::wireguard::keys::{PresharedKey, WgPrivateKey, WgPublicKey};

/// Firewall mark handed to clients unless configured otherwise.
pub const DEFAULT_FW_MARK: u32 = 51820;

/// Routes a client sends through the tunnel by default.
pub fn default_allowed_ips() -> Vec<IpNet> {
    [IpAddr::V4(Ipv4Addr::UNSPECIFIED), IpAddr::V6(Ipv6Addr::UNSPECIFIED)]
        .into_iter()
        .filter_map(|addr| IpNet::new(addr, 0).ok())
        .collect()
}

/// The `[Interface]` section shared by server and client configurations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interface {
    pub address: Vec<IpNet>,
    #[serde(default)]
    pub dns: Vec<IpAddr>,
    #[serde(default)]
    pub fw_mark: u32,
    #[serde(default)]
    pub pre_up: Vec<String>,
    #[serde(default)]
    pub post_up: Vec<String>,
    #[serde(default)]
    pub pre_down: Vec<String>,
    #[serde(default)]
    pub post_down: Vec<String>,
    /// Never leaves the host that generated it.
    #[serde(skip)]
    pub private_key: Option<WgPrivateKey>,
}

/// Server flavour of `[Interface]`, which also carries the listen port.
#[derive(Debug, Clone, Default)]
pub struct ServerInterface {
    pub listen_port: u16,
    pub interface: Interface,
}

/// A `[Peer]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    #[serde(default)]
    pub endpoint: Option<String>,
    pub allowed_ips: Vec<IpNet>,
    #[serde(default)]
    pub persistent_keepalive: Option<u16>,
    pub public_key: WgPublicKey,
    #[serde(default)]
    pub preshared_key: Option<PresharedKey>,
}

/// Server configuration file: one interface, any number of peers.
#[derive(Debug, Clone, Default)]
pub struct ServerConf {
    pub interface: ServerInterface,
    pub peers: Vec<Peer>,
}

/// Client configuration, as returned by the admission endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConf {
    pub interface: Interface,
    pub peers: Vec<Peer>,
}

fn write_lines<T: fmt::Display>(f: &mut fmt::Formatter<'_>, name: &str, values: &[T]) -> fmt::Result {
    for value in values {
        writeln!(f, "{} = {}", name, value)?;
    }
    Ok(())
}

/// Body of an interface section, without the header line.
fn write_interface_fields(f: &mut fmt::Formatter<'_>, iface: &Interface) -> fmt::Result {
    write_lines(f, "Address", &iface.address)?;
    write_lines(f, "DNS", &iface.dns)?;
    // 0 means "unset"; some clients reject an explicit zero mark.
    if iface.fw_mark != 0 {
        writeln!(f, "FwMark = {}", iface.fw_mark)?;
    }
    write_lines(f, "PreUp", &iface.pre_up)?;
    write_lines(f, "PostUp", &iface.post_up)?;
    write_lines(f, "PreDown", &iface.pre_down)?;
    write_lines(f, "PostDown", &iface.post_down)?;
    if let Some(key) = &iface.private_key {
        writeln!(f, "PrivateKey = {}", key.expose_base64())?;
    }
    Ok(())
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Interface]")?;
        write_interface_fields(f, self)?;
        writeln!(f)
    }
}

impl fmt::Display for ServerInterface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Interface]")?;
        if self.listen_port != 0 {
            writeln!(f, "ListenPort = {}", self.listen_port)?;
        }
        write_interface_fields(f, &self.interface)?;
        writeln!(f)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[Peer]")?;
        if let Some(endpoint) = self.endpoint.as_deref().filter(|e| !e.is_empty()) {
            writeln!(f, "Endpoint = {}", endpoint)?;
        }
        if !self.allowed_ips.is_empty() {
            let joined: Vec<String> = self.allowed_ips.iter().map(|ip| ip.to_string()).collect();
            writeln!(f, "AllowedIPs = {}", joined.join(", "))?;
        }
        if let Some(keepalive) = self.persistent_keepalive.filter(|k| *k != 0) {
            writeln!(f, "PersistentKeepalive = {}", keepalive)?;
        }
        writeln!(f, "PublicKey = {}", self.public_key)?;
        if let Some(psk) = &self.preshared_key {
            writeln!(f, "PresharedKey = {}", psk.to_base64())?;
        }
        writeln!(f)
    }
}

impl fmt::Display for ServerConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interface)?;
        for peer in &self.peers {
            write!(f, "{}", peer)?;
        }
        Ok(())
    }
}

impl fmt::Display for ClientConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.interface)?;
        for peer in &self.peers {
            write!(f, "{}", peer)?;
        }
        Ok(())
    }
}
