//! WireGuard key material.
//!
//! Keys are opaque 32-byte values. Their text form is standard (padded)
//! base64, which is what `wg` and `wg-quick` read and write.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// Length in bytes of every WireGuard key.
pub const KEY_LEN: usize = 32;

/// Errors produced when decoding key material.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The raw value does not have the expected key length.
    #[error("invalid key length: expected {KEY_LEN} bytes, got {0}")]
    InvalidLength(usize),

    /// The text form is not valid base64.
    #[error("invalid base64 encoding: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

fn key_bytes(raw: &[u8]) -> Result<[u8; KEY_LEN], KeyError> {
    raw.try_into().map_err(|_| KeyError::InvalidLength(raw.len()))
}

fn decode_base64(s: &str) -> Result<[u8; KEY_LEN], KeyError> {
    let raw = STANDARD.decode(s.trim())?;
    key_bytes(&raw)
}

/// A peer's public key.
///
/// Ordering is byte-lexicographic over the raw key bytes, which is the order
/// the admission store keeps its admitted set in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WgPublicKey([u8; KEY_LEN]);

impl WgPublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        decode_base64(s).map(Self)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for WgPublicKey {
    type Error = KeyError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        key_bytes(raw).map(Self)
    }
}

impl fmt::Debug for WgPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b64 = self.to_base64();
        f.debug_tuple("WgPublicKey")
            .field(&format!("{}...", &b64[..8]))
            .finish()
    }
}

impl fmt::Display for WgPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

/// A private (static) key. Zeroized on drop, never printed.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct WgPrivateKey([u8; KEY_LEN]);

impl WgPrivateKey {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        Self(secret.to_bytes())
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        decode_base64(s).map(Self)
    }

    /// Text form for configuration files. Handle with care.
    pub fn expose_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn public_key(&self) -> WgPublicKey {
        let secret = StaticSecret::from(self.0);
        WgPublicKey(*PublicKey::from(&secret).as_bytes())
    }
}

impl fmt::Debug for WgPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WgPrivateKey([REDACTED])")
    }
}

/// Optional symmetric secret mixed into the handshake.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct PresharedKey([u8; KEY_LEN]);

impl PresharedKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_base64(s: &str) -> Result<Self, KeyError> {
        decode_base64(s).map(Self)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl TryFrom<&[u8]> for PresharedKey {
    type Error = KeyError;

    fn try_from(raw: &[u8]) -> Result<Self, Self::Error> {
        key_bytes(raw).map(Self)
    }
}

impl fmt::Debug for PresharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PresharedKey([REDACTED])")
    }
}

/// The server's own key pair, generated fresh at every startup.
#[derive(Clone)]
pub struct WgKeyPair {
    private: WgPrivateKey,
    public: WgPublicKey,
}

impl WgKeyPair {
    pub fn generate() -> Self {
        Self::from_private(WgPrivateKey::generate())
    }

    pub fn from_private(private: WgPrivateKey) -> Self {
        let public = private.public_key();
        Self { private, public }
    }

    pub fn private_key(&self) -> &WgPrivateKey {
        &self.private
    }

    pub fn public_key(&self) -> &WgPublicKey {
        &self.public
    }
}

impl fmt::Debug for WgKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

impl Serialize for WgPublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for WgPublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for PresharedKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for PresharedKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_base64(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter carrying opaque byte strings as base64 text.
///
/// Used on the transport boundary, where key material arrives unvalidated
/// and must reach the admission store as raw bytes.
pub mod base64_bytes {
    use super::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use super::STANDARD;
        use base64::Engine;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|s| STANDARD.decode(s.trim()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
