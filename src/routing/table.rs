//! Routing table type.

use std::collections::btree_map::{self, BTreeMap};
use std::net::Ipv4Addr;

use crate::topology::InterfaceId;

/// Outbound interface and distance of one reachable address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub interface: InterfaceId,
    /// Number of switches traversed.
    pub hops: u32,
}

/// Reachable address to route, ordered by address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: BTreeMap<Ipv4Addr, Route>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `route` for `ip` if it is strictly shorter than the known one.
    pub fn offer(&mut self, ip: Ipv4Addr, route: Route) {
        match self.routes.entry(ip) {
            btree_map::Entry::Vacant(entry) => {
                entry.insert(route);
            }
            btree_map::Entry::Occupied(mut entry) => {
                if route.hops < entry.get().hops {
                    entry.insert(route);
                }
            }
        }
    }

    pub fn remove(&mut self, ip: &Ipv4Addr) -> Option<Route> {
        self.routes.remove(ip)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&Ipv4Addr, &Route) -> bool) {
        self.routes.retain(|ip, route| keep(ip, route));
    }

    pub fn get(&self, ip: &Ipv4Addr) -> Option<&Route> {
        self.routes.get(ip)
    }

    pub fn contains(&self, ip: &Ipv4Addr) -> bool {
        self.routes.contains_key(ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &Route)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
