//! Link realization planning.
//!
//! `configure` runs in two phases. The strategy first decides how every link
//! is realized and validates the bindings this needs ([`Decision`]); nothing
//! is allocated if any link fails. The shared planner then allocates link
//! IDs, VXLAN IDs and device names in link declaration order and records them
//! in the [`Allocations`] side table. Generation later only reads that table.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::commands;
use super::shaping;
use crate::config::Configuration;
use crate::ip::{AllocationError, IdAllocator};
use crate::topology::{InterfaceId, LinkId, NodeId, Topology};

/// Device name prefixes; a per-node counter is appended.
const BRIDGE_PREFIX: &str = "nb";
const VETH_PREFIX: &str = "nv";
const VXLAN_PREFIX: &str = "nx";
const SERVICE_PREFIX: &str = "ns";

/// How a strategy wants one link realized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    /// Both ends are the same interface.
    Loopback,
    /// Both ends execute on the same node.
    Local,
    Direct { device1: String, device2: String },
    Vxlan { underlay1: String, underlay2: String },
}

/// One end of a direct link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectSide {
    pub node: NodeId,
    pub bridge: String,
    pub device: String,
}

/// One end of a VXLAN link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VxlanSide {
    pub node: NodeId,
    pub bridge: String,
    pub device: String,
    pub underlay: String,
}

/// The host-level devices realizing a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Realization {
    Loopback {
        node: NodeId,
        bridge: String,
    },
    Local {
        node: NodeId,
        bridge1: String,
        bridge2: String,
        veth1: String,
        veth2: String,
    },
    Direct {
        side1: DirectSide,
        side2: DirectSide,
    },
    Vxlan {
        vni: u32,
        group: Ipv4Addr,
        port: u16,
        side1: VxlanSide,
        side2: VxlanSide,
    },
}

/// Everything `configure` allocated, keyed by link, interface and node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Allocations {
    link_ids: Vec<u32>,
    realizations: Vec<Realization>,
    bind_names: HashMap<InterfaceId, String>,
    service_devices: HashMap<InterfaceId, String>,
    device_counters: HashMap<NodeId, u32>,
}

impl Allocations {
    pub fn link_id(&self, link: LinkId) -> Option<u32> {
        self.link_ids.get(link.index()).copied()
    }

    pub fn realization(&self, link: LinkId) -> Option<&Realization> {
        self.realizations.get(link.index())
    }

    /// Bridge a service interface is attached to.
    pub fn bind_name(&self, interface: InterfaceId) -> Option<&str> {
        self.bind_names.get(&interface).map(String::as_str)
    }

    /// Host side of the veth connecting a service interface to its bridge.
    /// The container side carries the same name with a `p` suffix.
    pub fn service_device(&self, interface: InterfaceId) -> Option<&str> {
        self.service_devices.get(&interface).map(String::as_str)
    }

    /// Number of virtual devices named on `node` so far.
    pub fn device_counter(&self, node: NodeId) -> u32 {
        self.device_counters.get(&node).copied().unwrap_or(0)
    }

    fn next_device(&mut self, node: NodeId, prefix: &str) -> String {
        let counter = self.device_counters.entry(node).or_insert(0);
        *counter += 1;
        format!("{}{}", prefix, counter)
    }
}

/// VXLAN parameters the planner needs.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VxlanParams {
    pub vni_base: u32,
    pub group: Ipv4Addr,
    pub port: u16,
}

/// Allocate IDs and device names for validated decisions.
pub(crate) fn allocate(
    topology: &Topology,
    decisions: Vec<Decision>,
    vxlan: VxlanParams,
) -> Result<Allocations, AllocationError> {
    let mut allocations = Allocations::default();
    let mut link_ids = IdAllocator::link_ids();
    let mut vnis = IdAllocator::vxlan_ids(vxlan.vni_base);

    for ((id, link), decision) in topology.links().zip(decisions) {
        let link_id = link_ids.allocate()?;
        let node1 = topology.service(link.service1()).executor();
        let node2 = topology.service(link.service2()).executor();

        let realization = match decision {
            Decision::Loopback => {
                let bridge = allocations.next_device(node1, BRIDGE_PREFIX);
                allocations.bind_names.insert(link.interface1(), bridge.clone());
                Realization::Loopback { node: node1, bridge }
            }
            Decision::Local => {
                let bridge1 = allocations.next_device(node1, BRIDGE_PREFIX);
                let bridge2 = allocations.next_device(node1, BRIDGE_PREFIX);
                let veth1 = allocations.next_device(node1, VETH_PREFIX);
                let veth2 = allocations.next_device(node1, VETH_PREFIX);
                allocations.bind_names.insert(link.interface1(), bridge1.clone());
                allocations.bind_names.insert(link.interface2(), bridge2.clone());
                Realization::Local { node: node1, bridge1, bridge2, veth1, veth2 }
            }
            Decision::Direct { device1, device2 } => {
                let side1 = DirectSide {
                    node: node1,
                    bridge: allocations.next_device(node1, BRIDGE_PREFIX),
                    device: device1,
                };
                let side2 = DirectSide {
                    node: node2,
                    bridge: allocations.next_device(node2, BRIDGE_PREFIX),
                    device: device2,
                };
                allocations.bind_names.insert(link.interface1(), side1.bridge.clone());
                allocations.bind_names.insert(link.interface2(), side2.bridge.clone());
                Realization::Direct { side1, side2 }
            }
            Decision::Vxlan { underlay1, underlay2 } => {
                let vni = vnis.allocate()?;
                let side1 = VxlanSide {
                    node: node1,
                    bridge: allocations.next_device(node1, BRIDGE_PREFIX),
                    device: allocations.next_device(node1, VXLAN_PREFIX),
                    underlay: underlay1,
                };
                let side2 = VxlanSide {
                    node: node2,
                    bridge: allocations.next_device(node2, BRIDGE_PREFIX),
                    device: allocations.next_device(node2, VXLAN_PREFIX),
                    underlay: underlay2,
                };
                allocations.bind_names.insert(link.interface1(), side1.bridge.clone());
                allocations.bind_names.insert(link.interface2(), side2.bridge.clone());
                Realization::Vxlan {
                    vni,
                    group: vxlan.group,
                    port: vxlan.port,
                    side1,
                    side2,
                }
            }
        };
        log::debug!("Link {} (id {}) realized as {:?}", id, link_id, realization);
        allocations.link_ids.push(link_id);
        allocations.realizations.push(realization);
    }

    for (_, service) in topology.services() {
        for interface in service.interfaces() {
            if allocations.bind_names.contains_key(interface) && !allocations.service_devices.contains_key(interface) {
                let device = allocations.next_device(service.executor(), SERVICE_PREFIX);
                allocations.service_devices.insert(*interface, device);
            }
        }
    }

    Ok(allocations)
}

/// Append the network commands of every link touching `node`.
///
/// Shaping goes on the `service1` end only, unless `symmetric_shaping` asks
/// for both ends.
pub(crate) fn emit(
    topology: &Topology,
    allocations: &Allocations,
    node: NodeId,
    symmetric_shaping: bool,
    config: &mut Configuration,
) {
    for (id, link) in topology.links() {
        let props = link.properties();
        let Some(realization) = allocations.realization(id) else {
            continue;
        };
        match realization {
            Realization::Loopback { node: n, bridge } if *n == node => {
                commands::bridge(config, bridge);
            }
            Realization::Local { node: n, bridge1, bridge2, veth1, veth2 } if *n == node => {
                commands::bridge(config, bridge1);
                commands::bridge(config, bridge2);
                commands::veth_pair(config, veth1, veth2);
                commands::attach(config, veth1, bridge1);
                commands::attach(config, veth2, bridge2);
                commands::up(config, veth1);
                commands::up(config, veth2);
                shaping::shape(config, veth1, props);
                if symmetric_shaping {
                    shaping::shape(config, veth2, props);
                }
            }
            Realization::Direct { side1, side2 } => {
                for (side, first) in [(side1, true), (side2, false)] {
                    if side.node != node {
                        continue;
                    }
                    commands::bridge(config, &side.bridge);
                    commands::attach(config, &side.device, &side.bridge);
                    commands::up(config, &side.device);
                    if first || symmetric_shaping {
                        shaping::shape(config, &side.device, props);
                    }
                }
            }
            Realization::Vxlan { vni, group, port, side1, side2 } => {
                for (side, first) in [(side1, true), (side2, false)] {
                    if side.node != node {
                        continue;
                    }
                    commands::bridge(config, &side.bridge);
                    commands::vxlan(config, &side.device, *vni, *group, &side.underlay, *port);
                    commands::attach(config, &side.device, &side.bridge);
                    commands::up(config, &side.device);
                    if first || symmetric_shaping {
                        shaping::shape(config, &side.device, props);
                    }
                }
            }
            _ => {}
        }
    }
}
