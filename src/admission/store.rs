//! The admission store.
//!
//! # Responsibilities
//! - Validate submitted key material
//! - Reject keys that were admitted before
//! - Allocate the next peer addresses
//! - Hand the durable write to the processor without blocking
//!
//! # Design Decisions
//! - One mutex around all state: dedup, allocation, enqueue and insertion
//!   happen as a unit, so two concurrent requests can never receive the same
//!   allocation index
//! - The key is recorded only after the enqueue succeeded; a full queue
//!   leaves the store untouched
//! - Nothing under the lock awaits or does I/O

use std::net::{IpAddr, SocketAddr};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::admission::error::AdmissionError;
use crate::admission::pool::AddressPool;
use crate::observability::metrics;
use crate::processor::PendingWrite;
use crate::wireguard::conf::{default_allowed_ips, ClientConf, Interface, Peer};
use crate::wireguard::keys::{PresharedKey, WgKeyPair, WgPublicKey};

/// Static data the store hands out with every admission.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Public WireGuard endpoint clients connect to.
    pub endpoint: SocketAddr,
    pub dns: Vec<IpAddr>,
    /// Firewall mark written into client configurations.
    pub client_fw_mark: u32,
    pub pool: AddressPool,
    pub server_keys: WgKeyPair,
}

struct StoreState {
    settings: StoreSettings,
    /// Sorted, duplicate free.
    admitted: Vec<WgPublicKey>,
    queue: mpsc::Sender<PendingWrite>,
}

/// In-memory record of admitted peers and the single admission entry point.
pub struct AdmissionStore {
    state: Mutex<StoreState>,
}

impl AdmissionStore {
    pub fn new(settings: StoreSettings, queue: mpsc::Sender<PendingWrite>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                settings,
                admitted: Vec::with_capacity(32),
                queue,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        // State is only mutated after every fallible step, so a panic while
        // holding the lock cannot leave it half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admit a new peer.
    ///
    /// On success the peer's durable record is queued for the processor and
    /// the client's parameters are returned. On error nothing changed.
    pub fn admit_peer(
        &self,
        public_key: &[u8],
        preshared_key: Option<&[u8]>,
    ) -> Result<ClientConf, AdmissionError> {
        let mut state = self.lock();

        let preshared_key = preshared_key
            .map(PresharedKey::try_from)
            .transpose()
            .map_err(|_| AdmissionError::InvalidCredential("preshared key"))?;
        let public_key = WgPublicKey::try_from(public_key)
            .map_err(|_| AdmissionError::InvalidCredential("public key"))?;

        let slot = match state.admitted.binary_search(&public_key) {
            Ok(_) => return Err(AdmissionError::DuplicateKey),
            Err(slot) => slot,
        };

        let index = state.admitted.len() + 1;
        let allocation = state.settings.pool.allocate(index)?;

        let write = PendingWrite {
            index,
            allowed_ips: allocation.peer_allowed_ips,
            public_key,
            preshared_key: preshared_key.clone(),
        };
        match state.queue.try_send(write) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => return Err(AdmissionError::Backpressure),
            Err(TrySendError::Closed(_)) => return Err(AdmissionError::ProcessorClosed),
        }

        state.admitted.insert(slot, public_key);
        metrics::record_admitted_peers(state.admitted.len());

        tracing::debug!(
            public_key = %public_key,
            index,
            "Peer admitted"
        );

        let settings = &state.settings;
        Ok(ClientConf {
            interface: Interface {
                address: allocation.client_addresses,
                dns: settings.dns.clone(),
                fw_mark: settings.client_fw_mark,
                ..Default::default()
            },
            // The submitted credentials are echoed back as the peer
            // descriptor; the server key is not substituted here.
            peers: vec![Peer {
                endpoint: Some(settings.endpoint.to_string()),
                allowed_ips: default_allowed_ips(),
                persistent_keepalive: None,
                public_key,
                preshared_key,
            }],
        })
    }

    /// Number of admitted peers.
    pub fn admitted_count(&self) -> usize {
        self.lock().admitted.len()
    }

    /// Snapshot of the admitted set, in order.
    pub fn admitted_keys(&self) -> Vec<WgPublicKey> {
        self.lock().admitted.clone()
    }

    pub fn server_public_key(&self) -> WgPublicKey {
        *self.lock().settings.server_keys.public_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn settings(prefixes: &[&str]) -> StoreSettings {
        StoreSettings {
            endpoint: "203.0.113.7:51820".parse().unwrap(),
            dns: vec!["9.9.9.9".parse().unwrap()],
            client_fw_mark: 51820,
            pool: AddressPool::new(prefixes.iter().map(|p| p.parse().unwrap()).collect()).unwrap(),
            server_keys: WgKeyPair::generate(),
        }
    }

    fn store(prefixes: &[&str], capacity: usize) -> (AdmissionStore, mpsc::Receiver<PendingWrite>) {
        let (tx, rx) = mpsc::channel(capacity);
        (AdmissionStore::new(settings(prefixes), tx), rx)
    }

    fn key(n: u16) -> [u8; 32] {
        let mut k = [0u8; 32];
        k[..2].copy_from_slice(&n.to_be_bytes());
        k[31] = 0xAA;
        k
    }

    #[test]
    fn test_admission_returns_client_parameters() {
        let (store, mut rx) = store(&["10.8.0.1/24", "fd00:8::1/120"], 4);

        let conf = store.admit_peer(&key(1), Some(&[5u8; 32])).unwrap();

        let addrs: Vec<String> = conf.interface.address.iter().map(|a| a.to_string()).collect();
        assert_eq!(addrs, vec!["10.8.0.2/32", "fd00:8::2/128"]);
        assert_eq!(conf.interface.dns, vec!["9.9.9.9".parse::<IpAddr>().unwrap()]);
        assert_eq!(conf.interface.fw_mark, 51820);
        assert_eq!(conf.peers.len(), 1);
        assert_eq!(conf.peers[0].endpoint.as_deref(), Some("203.0.113.7:51820"));
        assert_eq!(conf.peers[0].public_key.as_bytes(), &key(1));

        let write = rx.try_recv().unwrap();
        assert_eq!(write.index, 1);
        assert_eq!(write.public_key.as_bytes(), &key(1));
        assert!(write.preshared_key.is_some());
    }

    #[test]
    fn test_invalid_credentials_are_rejected() {
        let (store, mut rx) = store(&["10.8.0.1/24"], 4);

        assert_eq!(
            store.admit_peer(&[1u8; 31], None).unwrap_err(),
            AdmissionError::InvalidCredential("public key")
        );
        assert_eq!(
            store.admit_peer(&key(1), Some(&[1u8; 12])).unwrap_err(),
            AdmissionError::InvalidCredential("preshared key")
        );
        assert_eq!(store.admitted_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_duplicate_key_is_rejected_without_state_change() {
        let (store, mut rx) = store(&["10.8.0.1/24"], 8);

        store.admit_peer(&key(7), None).unwrap();
        assert_eq!(
            store.admit_peer(&key(7), None).unwrap_err(),
            AdmissionError::DuplicateKey
        );
        assert_eq!(store.admitted_keys(), vec![WgPublicKey::from_bytes(key(7))]);

        rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err(), "duplicate must not enqueue");
    }

    #[test]
    fn test_admitted_set_stays_sorted() {
        let (store, _rx) = store(&["10.8.0.1/24"], 16);
        for n in [9u16, 3, 700, 1, 42] {
            store.admit_peer(&key(n), None).unwrap();
        }
        let keys = store.admitted_keys();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(keys.len(), 5);
    }

    #[test]
    fn test_allocations_are_unique_and_in_prefix() {
        let (store, _rx) = store(&["10.8.0.0/24", "fd00:8::/120"], 300);
        let prefixes: Vec<ipnet::IpNet> = vec!["10.8.0.0/24".parse().unwrap(), "fd00:8::/120".parse().unwrap()];

        let mut seen = HashSet::new();
        for n in 0..100u16 {
            let conf = store.admit_peer(&key(n), None).unwrap();
            for (addr, prefix) in conf.interface.address.iter().zip(&prefixes) {
                assert!(prefix.contains(&addr.addr()));
                assert!(seen.insert(*addr), "address {} handed out twice", addr);
            }
        }
        assert_eq!(seen.len(), 200);
    }

    #[test]
    fn test_backpressure_leaves_store_unchanged() {
        let (store, mut rx) = store(&["10.8.0.1/24"], 2);
        store.admit_peer(&key(1), None).unwrap();
        store.admit_peer(&key(2), None).unwrap();

        let before = store.admitted_keys();
        assert_eq!(
            store.admit_peer(&key(3), None).unwrap_err(),
            AdmissionError::Backpressure
        );
        assert_eq!(store.admitted_keys(), before);

        // Once the processor catches up the same key is accepted, and gets
        // the index the rejected attempt would have had.
        rx.try_recv().unwrap();
        store.admit_peer(&key(3), None).unwrap();
        rx.try_recv().unwrap();
        assert_eq!(rx.try_recv().unwrap().index, 3);
    }

    #[test]
    fn test_closed_queue_is_reported() {
        let (store, rx) = store(&["10.8.0.1/24"], 2);
        drop(rx);
        assert_eq!(
            store.admit_peer(&key(1), None).unwrap_err(),
            AdmissionError::ProcessorClosed
        );
        assert_eq!(store.admitted_count(), 0);
    }

    #[test]
    fn test_capacity_boundary() {
        let (store, _rx) = store(&["10.8.0.0/24"], 512);
        for n in 0..254u16 {
            store.admit_peer(&key(n), None).unwrap();
        }

        let conf = store.admit_peer(&key(254), None).unwrap();
        assert_eq!(conf.interface.address[0].to_string(), "10.8.0.255/32");

        assert_eq!(
            store.admit_peer(&key(255), None).unwrap_err(),
            AdmissionError::PoolExhausted { index: 256 }
        );
        assert_eq!(store.admitted_count(), 255);
    }
}
