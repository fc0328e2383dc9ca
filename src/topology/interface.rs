//! Network interfaces owned by nodes and services.

use ipnet::Ipv4Net;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::types::{InterfaceId, LinkId, Owner};
use crate::ip::MacAddress;

/// Name of the implicit loopback interface of every node.
pub const LOOPBACK_NAME: &str = "lo";

lazy_static! {
    // Linux limits device names to 15 bytes (IFNAMSIZ - 1).
    static ref INTERFACE_NAME: Regex = Regex::new(r"^[A-Za-z0-9_.-]{1,15}$").unwrap();
}

/// Check that `name` is usable as a Linux network device name
pub fn is_valid_interface_name(name: &str) -> bool {
    INTERFACE_NAME.is_match(name)
}

/// One address carried by an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceAddress {
    pub ip: Ipv4Addr,
    pub network: Ipv4Net,
}

impl InterfaceAddress {
    pub fn new(ip: Ipv4Addr, network: Ipv4Net) -> Self {
        Self { ip, network }
    }

    /// The address in `ip/prefix` notation, as `ip addr add` expects it.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.ip, self.network.prefix_len())
    }

    pub(crate) fn loopback() -> Self {
        Self {
            ip: Ipv4Addr::LOCALHOST,
            network: Ipv4Net::new(Ipv4Addr::new(127, 0, 0, 0), 8).unwrap_or_default(),
        }
    }
}

/// A named network endpoint.
///
/// The far side of a link is kept as an arena index (`other_end`), so an
/// interface never owns its peer.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub(crate) name: String,
    pub(crate) owner: Owner,
    pub(crate) mac_address: Option<MacAddress>,
    pub(crate) addresses: Vec<InterfaceAddress>,
    pub(crate) other_end: Option<InterfaceId>,
    pub(crate) links: Vec<LinkId>,
}

impl Interface {
    pub(crate) fn new(
        name: impl Into<String>,
        owner: Owner,
        addresses: Vec<InterfaceAddress>,
        mac_address: Option<MacAddress>,
    ) -> Self {
        Self {
            name: name.into(),
            owner,
            mac_address,
            addresses,
            other_end: None,
            links: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn mac_address(&self) -> Option<MacAddress> {
        self.mac_address
    }

    pub fn addresses(&self) -> &[InterfaceAddress] {
        &self.addresses
    }

    /// Interface at the far side of the link using this one.
    pub fn other_end(&self) -> Option<InterfaceId> {
        self.other_end
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn is_loopback(&self) -> bool {
        self.name == LOOPBACK_NAME
    }

    pub fn has_address(&self, ip: Ipv4Addr) -> bool {
        self.addresses.iter().any(|a| a.ip == ip)
    }
}
