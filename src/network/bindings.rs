//! Link-to-device bindings.
//!
//! A binding pins both ends of a link to physical devices of the nodes
//! executing the link's services. A device may back at most one bound link
//! per node.

use serde::{Deserialize, Serialize};

use super::BindingError;
use crate::topology::{InterfaceId, LinkId, NodeId, Topology};

/// Devices backing one link, by link declaration index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkBinding {
    pub link: usize,
    pub device1: String,
    pub device2: String,
}

/// All bindings of a strategy, ordered by link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LinkBindings(Vec<LinkBinding>);

/// Find a non-loopback device named `device` on `node`.
pub(crate) fn resolve_device(topology: &Topology, node: NodeId, device: &str) -> Result<InterfaceId, BindingError> {
    topology
        .node_interface(node, device)
        .filter(|id| !topology.interface(*id).is_loopback())
        .ok_or_else(|| BindingError::UnknownDevice {
            node: topology.node(node).name().to_string(),
            device: device.to_string(),
        })
}

/// Nodes executing the two ends of `link`.
pub(crate) fn link_nodes(topology: &Topology, link: LinkId) -> (NodeId, NodeId) {
    let l = topology.link(link);
    (
        topology.service(l.service1()).executor(),
        topology.service(l.service2()).executor(),
    )
}

impl LinkBindings {
    pub fn get(&self, link: LinkId) -> Option<&LinkBinding> {
        self.0.iter().find(|b| b.link == link.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkBinding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that binding `link` to `device1`/`device2` is possible: both
    /// devices exist on their nodes and no other bound link uses them.
    pub fn check(&self, topology: &Topology, link: LinkId, device1: &str, device2: &str) -> Result<(), BindingError> {
        if link.index() >= topology.link_count() {
            return Err(BindingError::UnknownLink(link.index()));
        }
        let (node1, node2) = link_nodes(topology, link);
        resolve_device(topology, node1, device1)?;
        resolve_device(topology, node2, device2)?;

        if node1 == node2 && device1 == device2 {
            return Err(BindingError::DeviceInUse {
                node: topology.node(node1).name().to_string(),
                device: device1.to_string(),
                link: link.index(),
                other: link.index(),
            });
        }

        for other in self.0.iter().filter(|b| b.link != link.index()) {
            if other.link >= topology.link_count() {
                continue;
            }
            let (other1, other2) = link_nodes(topology, LinkId(other.link));
            for (node, device) in [(node1, device1), (node2, device2)] {
                let clash = (other1 == node && other.device1 == device) || (other2 == node && other.device2 == device);
                if clash {
                    return Err(BindingError::DeviceInUse {
                        node: topology.node(node).name().to_string(),
                        device: device.to_string(),
                        link: link.index(),
                        other: other.link,
                    });
                }
            }
        }
        Ok(())
    }

    /// Record a binding, replacing any previous binding of the same link.
    pub fn insert(&mut self, link: LinkId, device1: &str, device2: &str) {
        let binding = LinkBinding {
            link: link.index(),
            device1: device1.to_string(),
            device2: device2.to_string(),
        };
        match self.0.iter_mut().find(|b| b.link == link.index()) {
            Some(existing) => *existing = binding,
            None => {
                self.0.push(binding);
                self.0.sort_by_key(|b| b.link);
            }
        }
    }

    /// Re-check every recorded binding against the topology.
    pub fn validate(&self, topology: &Topology) -> Result<(), BindingError> {
        for binding in &self.0 {
            self.check(topology, LinkId(binding.link), &binding.device1, &binding.device2)?;
        }
        Ok(())
    }
}
