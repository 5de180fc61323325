//! WireGuard data types.
//!
//! # Contents
//! - keys.rs: public, private and preshared keys (32 raw bytes, base64 text)
//! - conf.rs: `[Interface]` / `[Peer]` blocks and their rendering
//!
//! Nothing here talks to the kernel or to `wg`; these are plain values the
//! admission store hands out and the processor writes to disk.

pub mod conf;
pub mod keys;

pub use conf::{ClientConf, Interface, Peer, ServerConf, ServerInterface, DEFAULT_FW_MARK};
pub use keys::{KeyError, PresharedKey, WgKeyPair, WgPrivateKey, WgPublicKey};
