//! Default strategy: direct or VXLAN per link.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::bindings::{link_nodes, LinkBindings};
use super::direct::missing_binding;
use super::plan::Decision;
use super::vxlan::VxlanSettings;
use super::BindingError;
use crate::ip::BasicNetworkAddressGenerator;
use crate::topology::{LinkId, Topology};

/// How a cross-node link is carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Direct,
    #[default]
    Vxlan,
}

/// Chooses direct or VXLAN realization per link.
///
/// Links are VXLAN unless declared otherwise; recording a device mapping
/// makes a link direct. Every link's requirements are checked before any
/// allocation happens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefaultNetwork {
    #[serde(default)]
    pub generator: BasicNetworkAddressGenerator,
    #[serde(flatten)]
    pub vxlan: VxlanSettings,
    #[serde(default, skip_serializing_if = "LinkBindings::is_empty")]
    pub bindings: LinkBindings,
    /// Declaration indices of links carried directly; all others are VXLAN.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub direct_links: BTreeSet<usize>,
    #[serde(default)]
    pub symmetric_shaping: bool,
}

impl DefaultNetwork {
    pub fn new(generator: BasicNetworkAddressGenerator) -> Self {
        Self {
            generator,
            ..Default::default()
        }
    }

    pub fn with_default_device(mut self, device: impl Into<String>) -> Self {
        self.vxlan.default_device = Some(device.into());
        self
    }

    pub fn set_node_device(&mut self, node: impl Into<String>, device: impl Into<String>) {
        self.vxlan.node_devices.insert(node.into(), device.into());
    }

    pub fn set_link_kind(&mut self, link: LinkId, kind: LinkKind) {
        match kind {
            LinkKind::Direct => self.direct_links.insert(link.index()),
            LinkKind::Vxlan => self.direct_links.remove(&link.index()),
        };
    }

    pub fn link_kind(&self, link: LinkId) -> LinkKind {
        if self.direct_links.contains(&link.index()) {
            LinkKind::Direct
        } else {
            LinkKind::Vxlan
        }
    }

    pub(crate) fn record(&mut self, link: LinkId, device1: &str, device2: &str) {
        self.bindings.insert(link, device1, device2);
        self.set_link_kind(link, LinkKind::Direct);
    }

    pub(crate) fn decide(&self, topology: &Topology) -> Result<Vec<Decision>, BindingError> {
        self.bindings.validate(topology)?;
        let decisions = topology
            .links()
            .map(|(id, link)| {
                if link.is_loopback() {
                    return Ok(Decision::Loopback);
                }
                let (node1, node2) = link_nodes(topology, id);
                match (self.link_kind(id), self.bindings.get(id)) {
                    (LinkKind::Direct, Some(binding)) => Ok(Decision::Direct {
                        device1: binding.device1.clone(),
                        device2: binding.device2.clone(),
                    }),
                    _ if node1 == node2 => Ok(Decision::Local),
                    (LinkKind::Direct, None) => Err(missing_binding(topology, id)),
                    (LinkKind::Vxlan, _) => self.vxlan.decide(topology, id),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        self.check_underlays(topology, &decisions)?;
        Ok(decisions)
    }

    /// An underlay must not also be enslaved to a direct link's bridge.
    fn check_underlays(&self, topology: &Topology, decisions: &[Decision]) -> Result<(), BindingError> {
        for ((id, _), decision) in topology.links().zip(decisions) {
            let Decision::Direct { device1, device2 } = decision else {
                continue;
            };
            let (node1, node2) = link_nodes(topology, id);
            for ((other, _), other_decision) in topology.links().zip(decisions) {
                let Decision::Vxlan { underlay1, underlay2 } = other_decision else {
                    continue;
                };
                let (o1, o2) = link_nodes(topology, other);
                for (node, device) in [(node1, device1), (node2, device2)] {
                    if (o1 == node && underlay1 == device) || (o2 == node && underlay2 == device) {
                        return Err(BindingError::UnderlayInUse {
                            node: topology.node(node).name().to_string(),
                            device: device.clone(),
                            link: id.index(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{NetworkImplementation, Realization};
    use crate::services::{LxcHost, ServiceKind};
    use crate::topology::{LinkProperties, NodeType, RemoteAccess, TopologyError};

    fn topology(network: DefaultNetwork) -> Topology {
        let mut topo = Topology::new(NetworkImplementation::Default(network));
        for node in ["n1", "n2"] {
            topo.add_node(node, NodeType::Ubuntu, RemoteAccess::new(node)).unwrap();
            topo.add_node_interface(node, "eth0", vec![], None).unwrap();
            topo.add_node_interface(node, "eth1", vec![], None).unwrap();
        }
        topo.add_service("a", "n1", ServiceKind::Lxc(LxcHost::default())).unwrap();
        topo.add_service("b", "n2", ServiceKind::Lxc(LxcHost::default())).unwrap();
        topo
    }

    #[test]
    fn test_mixes_direct_and_vxlan() {
        let mut topo = topology(DefaultNetwork::default().with_default_device("eth0"));
        let direct = topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        let overlay = topo.add_link("a", "eth1", "b", "eth1", LinkProperties::default()).unwrap();
        topo.set_link_interface_mapping(direct, "eth1", "eth1").unwrap();
        topo.finalize().unwrap();

        let allocations = topo.allocations().unwrap();
        assert!(matches!(allocations.realization(direct), Some(Realization::Direct { .. })));
        match allocations.realization(overlay) {
            Some(Realization::Vxlan { vni, .. }) => assert_eq!(*vni, 100),
            other => panic!("unexpected realization {:?}", other),
        }
    }

    #[test]
    fn test_direct_kind_without_binding_fails() {
        let mut topo = topology(DefaultNetwork::default().with_default_device("eth0"));
        let link = topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        if let NetworkImplementation::Default(network) = topo.network_mut().unwrap() {
            network.set_link_kind(link, LinkKind::Direct);
        }
        assert!(matches!(
            topo.finalize(),
            Err(TopologyError::Binding(BindingError::MissingBinding { .. }))
        ));
    }

    #[test]
    fn test_underlay_cannot_be_direct_bound() {
        let mut topo = topology(DefaultNetwork::default().with_default_device("eth0"));
        let direct = topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        topo.add_link("a", "eth1", "b", "eth1", LinkProperties::default()).unwrap();
        topo.set_link_interface_mapping(direct, "eth0", "eth1").unwrap();
        assert!(matches!(
            topo.finalize(),
            Err(TopologyError::Binding(BindingError::UnderlayInUse { link: 0, .. }))
        ));
    }
}
