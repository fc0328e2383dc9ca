//! VXLAN overlay strategy.
//!
//! Cross-node links are tunneled over a multicast VXLAN overlay carried by a
//! physical underlay device on each node. Links between services on the same
//! node stay local.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::bindings::{link_nodes, resolve_device};
use super::plan::{Decision, VxlanParams};
use super::BindingError;
use crate::ip::{BasicNetworkAddressGenerator, DEFAULT_VNI_BASE};
use crate::topology::{LinkId, NodeId, Topology};

/// Default multicast group of the overlay.
pub const DEFAULT_VXLAN_GROUP: Ipv4Addr = Ipv4Addr::new(239, 1, 1, 1);

/// IANA-assigned VXLAN port.
pub const DEFAULT_VXLAN_PORT: u16 = 4789;

fn default_group() -> Ipv4Addr {
    DEFAULT_VXLAN_GROUP
}

fn default_port() -> u16 {
    DEFAULT_VXLAN_PORT
}

fn default_vni_base() -> u32 {
    DEFAULT_VNI_BASE
}

/// Overlay parameters shared by the VXLAN and hybrid strategies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VxlanSettings {
    #[serde(default = "default_group")]
    pub group: Ipv4Addr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_vni_base")]
    pub vni_base: u32,
    /// Underlay used on nodes without an explicit entry in `node_devices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_device: Option<String>,
    /// Underlay device per node name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_devices: BTreeMap<String, String>,
}

impl Default for VxlanSettings {
    fn default() -> Self {
        Self {
            group: DEFAULT_VXLAN_GROUP,
            port: DEFAULT_VXLAN_PORT,
            vni_base: DEFAULT_VNI_BASE,
            default_device: None,
            node_devices: BTreeMap::new(),
        }
    }
}

impl VxlanSettings {
    /// Resolve the underlay device of `node`.
    pub fn underlay(&self, topology: &Topology, node: NodeId) -> Result<String, BindingError> {
        let name = topology.node(node).name();
        let device = self
            .node_devices
            .get(name)
            .or(self.default_device.as_ref())
            .ok_or_else(|| BindingError::MissingUnderlay { node: name.to_string() })?;
        resolve_device(topology, node, device)?;
        Ok(device.clone())
    }

    pub(crate) fn params(&self) -> VxlanParams {
        VxlanParams {
            vni_base: self.vni_base,
            group: self.group,
            port: self.port,
        }
    }

    /// Decision for a link that should go over the overlay.
    pub(crate) fn decide(&self, topology: &Topology, link: LinkId) -> Result<Decision, BindingError> {
        let (node1, node2) = link_nodes(topology, link);
        Ok(Decision::Vxlan {
            underlay1: self.underlay(topology, node1)?,
            underlay2: self.underlay(topology, node2)?,
        })
    }
}

/// Realize every cross-node link as a VXLAN tunnel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VxlanNetwork {
    #[serde(default)]
    pub generator: BasicNetworkAddressGenerator,
    #[serde(flatten)]
    pub vxlan: VxlanSettings,
    #[serde(default)]
    pub symmetric_shaping: bool,
}

impl VxlanNetwork {
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

    /// Use `device` as the underlay on `node`.
    pub fn set_node_device(&mut self, node: impl Into<String>, device: impl Into<String>) {
        self.vxlan.node_devices.insert(node.into(), device.into());
    }

    pub(crate) fn decide(&self, topology: &Topology) -> Result<Vec<Decision>, BindingError> {
        topology
            .links()
            .map(|(id, link)| {
                if link.is_loopback() {
                    return Ok(Decision::Loopback);
                }
                let (node1, node2) = link_nodes(topology, id);
                if node1 == node2 {
                    Ok(Decision::Local)
                } else {
                    self.vxlan.decide(topology, id)
                }
            })
            .collect()
    }
}
