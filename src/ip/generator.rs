//! Deterministic address generation.
//!
//! Generators hand out addresses from an internal monotonic counter. The
//! service and interface arguments name the requester for logging only: two
//! generators seeded the same way and called in the same order produce the
//! same sequence, whatever the requesters are.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::mac::{MacAddress, MAC_SPACE};

/// Default MAC seed: locally administered, unicast.
pub const DEFAULT_MAC_BASE: u64 = 0x02_00_00_00_00_00;

/// First host index handed out; `.0` is the network and `.1` the gateway.
pub const FIRST_HOST_INDEX: u32 = 2;

/// Errors raised when an allocator runs out of values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("Address space of {network} exhausted")]
    AddressSpaceExhausted { network: Ipv4Net },

    #[error("MAC address space exhausted")]
    MacSpaceExhausted,

    #[error("{kind} space exhausted after {last}")]
    IdSpaceExhausted { kind: &'static str, last: u32 },
}

/// Source of fresh addresses for interfaces created on demand by links.
pub trait AddressGenerator {
    /// Next IPv4 address.
    fn generate_ip(&mut self, service: &str, interface: &str) -> Result<Ipv4Addr, AllocationError>;

    /// Network the addresses belong to.
    fn generate_network(&mut self, service: &str, interface: &str) -> Result<Ipv4Net, AllocationError>;

    /// Next hardware address.
    fn generate_mac(&mut self, service: &str, interface: &str) -> Result<MacAddress, AllocationError>;
}

/// Counter-based generator seeded from a base network and a base MAC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicNetworkAddressGenerator {
    pub network: Ipv4Net,
    pub mac_base: u64,
    ip_counter: u32,
    mac_counter: u64,
}

impl BasicNetworkAddressGenerator {
    pub fn new(network: Ipv4Net, mac_base: u64) -> Self {
        Self {
            network: network.trunc(),
            mac_base,
            ip_counter: FIRST_HOST_INDEX,
            mac_counter: mac_base,
        }
    }

    /// Number of host indices usable before the broadcast address.
    fn capacity(&self) -> u64 {
        let size = 1u64 << (32 - self.network.prefix_len() as u32);
        size.saturating_sub(1)
    }

    /// Number of addresses handed out so far.
    pub fn allocated_ips(&self) -> u32 {
        self.ip_counter - FIRST_HOST_INDEX
    }
}

impl Default for BasicNetworkAddressGenerator {
    fn default() -> Self {
        let network = Ipv4Net::new(Ipv4Addr::new(10, 0, 0, 0), 16).unwrap_or_default();
        Self::new(network, DEFAULT_MAC_BASE)
    }
}

impl AddressGenerator for BasicNetworkAddressGenerator {
    fn generate_ip(&mut self, service: &str, interface: &str) -> Result<Ipv4Addr, AllocationError> {
        if self.ip_counter as u64 >= self.capacity() {
            return Err(AllocationError::AddressSpaceExhausted { network: self.network });
        }
        let base = u32::from(self.network.network());
        let ip = Ipv4Addr::from(base + self.ip_counter);
        self.ip_counter += 1;
        log::debug!("Allocated {} for {}:{}", ip, service, interface);
        Ok(ip)
    }

    fn generate_network(&mut self, _service: &str, _interface: &str) -> Result<Ipv4Net, AllocationError> {
        Ok(self.network)
    }

    fn generate_mac(&mut self, service: &str, interface: &str) -> Result<MacAddress, AllocationError> {
        if self.mac_counter >= MAC_SPACE {
            return Err(AllocationError::MacSpaceExhausted);
        }
        let mac = MacAddress::from_u64(self.mac_counter).ok_or(AllocationError::MacSpaceExhausted)?;
        self.mac_counter += 1;
        log::debug!("Allocated MAC {} for {}:{}", mac, service, interface);
        Ok(mac)
    }
}
