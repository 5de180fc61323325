//! Address pool and per-peer address derivation.
//!
//! # Scheme
//! Each configured prefix carries the server's own address (e.g.
//! `10.8.0.1/24`). Peer number `k` gets the server address with `k` added to
//! its lowest-order byte, without carrying into higher bytes. This bounds the
//! pool at 255 peers per prefix; the bound is reported as
//! [`AdmissionError::PoolExhausted`] instead of wrapping around inside the byte.

use ipnet::IpNet;
use std::net::IpAddr;

use crate::admission::error::AdmissionError;

/// Largest allocation index the last-byte scheme can express.
pub const MAX_OFFSET: usize = u8::MAX as usize;

/// Addresses handed to one admitted peer, one entry per configured prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAllocation {
    pub index: usize,
    /// Goes into the client's `[Interface] Address`.
    pub client_addresses: Vec<IpNet>,
    /// Goes into the server's `[Peer] AllowedIPs`.
    pub peer_allowed_ips: Vec<IpNet>,
}

/// Ordered, immutable list of prefixes peers are carved from.
#[derive(Debug, Clone)]
pub struct AddressPool {
    prefixes: Vec<IpNet>,
}

impl AddressPool {
    /// Returns `None` for an empty prefix list.
    pub fn new(prefixes: Vec<IpNet>) -> Option<Self> {
        if prefixes.is_empty() {
            return None;
        }
        Some(Self { prefixes })
    }

    pub fn prefixes(&self) -> &[IpNet] {
        &self.prefixes
    }

    /// Derive the addresses for allocation `index` (1-based; 0 is the server).
    pub fn allocate(&self, index: usize) -> Result<PeerAllocation, AdmissionError> {
        let offset = u8::try_from(index)
            .ok()
            .filter(|k| *k > 0)
            .ok_or(AdmissionError::PoolExhausted { index })?;

        let mut client_addresses = Vec::with_capacity(self.prefixes.len());
        let mut peer_allowed_ips = Vec::with_capacity(self.prefixes.len());

        for prefix in &self.prefixes {
            let addr = offset_last_byte(prefix.addr(), offset)
                .ok_or(AdmissionError::PoolExhausted { index })?;

            if !prefix.contains(&addr) {
                return Err(AdmissionError::AllocationError {
                    prefix: prefix.to_string(),
                });
            }

            // Host mask (/32 or /128) on both sides.
            client_addresses.push(IpNet::from(addr));
            peer_allowed_ips.push(IpNet::from(addr));
        }

        Ok(PeerAllocation {
            index,
            client_addresses,
            peer_allowed_ips,
        })
    }
}

/// Add `offset` to the last byte only. `None` if the byte would overflow.
fn offset_last_byte(base: IpAddr, offset: u8) -> Option<IpAddr> {
    match base {
        IpAddr::V4(v4) => {
            let mut octets = v4.octets();
            octets[3] = octets[3].checked_add(offset)?;
            Some(IpAddr::from(octets))
        }
        IpAddr::V6(v6) => {
            let mut octets = v6.octets();
            octets[15] = octets[15].checked_add(offset)?;
            Some(IpAddr::from(octets))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(prefixes: &[&str]) -> AddressPool {
        AddressPool::new(prefixes.iter().map(|p| p.parse().unwrap()).collect()).unwrap()
    }

    fn strings(nets: &[IpNet]) -> Vec<String> {
        nets.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_first_allocation_follows_server_address() {
        let pool = pool(&["10.8.0.1/24", "fd00:8::1/120"]);
        let alloc = pool.allocate(1).unwrap();

        assert_eq!(strings(&alloc.client_addresses), vec!["10.8.0.2/32", "fd00:8::2/128"]);
        assert_eq!(alloc.client_addresses, alloc.peer_allowed_ips);
    }

    #[test]
    fn test_no_carry_into_higher_bytes() {
        let pool = pool(&["10.8.0.1/16"]);
        // 1 + 255 overflows the last byte; the scheme refuses instead of
        // wrapping to 10.8.0.0 or carrying into 10.8.1.0.
        assert_eq!(
            pool.allocate(255).unwrap_err(),
            AdmissionError::PoolExhausted { index: 255 }
        );
        assert_eq!(
            strings(&pool.allocate(254).unwrap().client_addresses),
            vec!["10.8.0.255/32"]
        );
    }

    #[test]
    fn test_index_bounds() {
        let pool = pool(&["10.8.0.0/24"]);
        assert!(pool.allocate(255).is_ok());
        assert_eq!(
            pool.allocate(256).unwrap_err(),
            AdmissionError::PoolExhausted { index: 256 }
        );
        assert!(matches!(
            pool.allocate(0),
            Err(AdmissionError::PoolExhausted { index: 0 })
        ));
    }

    #[test]
    fn test_narrow_prefix_is_allocation_error() {
        let pool = pool(&["10.8.0.0/24", "192.168.5.1/29"]);
        assert!(pool.allocate(6).is_ok());
        assert_eq!(
            pool.allocate(7).unwrap_err(),
            AdmissionError::AllocationError {
                prefix: "192.168.5.1/29".into()
            }
        );
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(AddressPool::new(Vec::new()).is_none());
    }
}
