//! Reachability engine.
//!
//! [`build_routing_table`] walks the link graph from every interface of a
//! service and records which addresses are reachable through it and how many
//! switches lie on the way. Switches forward reachability to their other
//! ports, except ports facing their controllers and ports the switch kind
//! excludes. Any other service ends the walk and exposes its own addresses.

pub mod table;

pub use table::{Route, RoutingTable};

use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;

use crate::topology::{InterfaceId, ServiceId, Topology};

/// Compute the routing table of `service`.
///
/// For each reachable address the interface with the fewest hops wins; on a
/// tie the interface declared first is kept. Loopback and the service's own
/// addresses are never routed.
///
/// In `for_switch` mode only controllers are exposed, which is what a switch
/// needs to reach its control plane.
pub fn build_routing_table(topology: &Topology, service: ServiceId, for_switch: bool) -> RoutingTable {
    let svc = topology.service(service);
    let mut table = RoutingTable::new();

    for &interface in svc.interfaces() {
        let mut walk = Walk {
            topology,
            for_switch,
            root: service,
            origin: interface,
            expanded: HashSet::new(),
            queue: VecDeque::from([(interface, 0)]),
            table: &mut table,
        };
        walk.run();
    }

    let own: HashSet<Ipv4Addr> = svc
        .interfaces()
        .iter()
        .flat_map(|id| topology.interface(*id).addresses())
        .map(|a| a.ip)
        .collect();
    table.retain(|ip, _| !ip.is_loopback() && !own.contains(ip));

    log::trace!("Routing table of {}: {} entries", svc.name(), table.len());
    table
}

/// Breadth-first walk from one interface of the root service.
///
/// Queue entries are local interfaces whose link is still to be followed,
/// in nondecreasing hop order. A switch forwards at most once per ingress
/// port, so every port is expanded at its smallest hop count.
struct Walk<'a, 't> {
    topology: &'a Topology,
    for_switch: bool,
    root: ServiceId,
    /// Interface of the root service the walk started from.
    origin: InterfaceId,
    /// Switch ingress ports already forwarded from.
    expanded: HashSet<InterfaceId>,
    queue: VecDeque<(InterfaceId, u32)>,
    table: &'t mut RoutingTable,
}

impl Walk<'_, '_> {
    fn run(&mut self) {
        while let Some((local, hops)) = self.queue.pop_front() {
            self.step(local, hops);
        }
    }

    fn expose(&mut self, interface: InterfaceId, hops: u32) {
        for address in self.topology.interface(interface).addresses() {
            self.table.offer(address.ip, Route { interface: self.origin, hops });
        }
    }

    /// Follow the link attached to `local`.
    fn step(&mut self, local: InterfaceId, hops: u32) {
        let topology = self.topology;
        let Some(far) = topology.other_end(local) else {
            return;
        };
        if far == local {
            return;
        }
        let (Some(from), Some(neighbor)) = (topology.interface_service(local), topology.interface_service(far)) else {
            return;
        };
        if neighbor == self.root {
            return;
        }
        let nsvc = topology.service(neighbor);

        if !nsvc.is_switch() {
            if !self.for_switch || nsvc.is_controller() {
                for &interface in nsvc.interfaces() {
                    self.expose(interface, hops);
                }
            }
            return;
        }

        if !self.for_switch {
            self.expose(far, hops);
        }
        let from_name = topology.service(from).name();
        if nsvc.controllers().iter().any(|c| c == from_name) {
            return;
        }
        if nsvc.is_switch_exclude(topology.interface(far).name()) {
            return;
        }
        if !self.expanded.insert(far) {
            return;
        }

        for &port in nsvc.interfaces() {
            if port == far || nsvc.is_switch_exclude(topology.interface(port).name()) {
                continue;
            }
            let faces_controller = topology
                .other_end_service(port)
                .map(|s| nsvc.controllers().iter().any(|c| c == topology.service(s).name()))
                .unwrap_or(false);
            if faces_controller {
                continue;
            }
            self.queue.push_back((port, hops + 1));
        }
    }
}
