//! Network implementation strategies.
//!
//! A strategy decides how each link of a topology is realized on the
//! physical nodes and emits the host-level commands for it. Three strategies
//! exist:
//!
//! - [`DirectNetwork`]: cross-node links ride on explicitly bound devices.
//! - [`VxlanNetwork`]: cross-node links are tunneled over a VXLAN overlay.
//! - [`DefaultNetwork`]: picks one of the two per link.
//!
//! Planning is split in two phases. `configure` validates every link and
//! allocates identifiers and device names into an [`Allocations`] table;
//! `generate` then only reads that table, so generation never fails halfway
//! through a node.

pub mod bindings;
pub mod commands;
pub mod direct;
pub mod hybrid;
pub mod plan;
pub mod shaping;
pub mod vxlan;

pub use bindings::{LinkBinding, LinkBindings};
pub use direct::DirectNetwork;
pub use hybrid::{DefaultNetwork, LinkKind};
pub use plan::{Allocations, DirectSide, Realization, VxlanSide};
pub use vxlan::{VxlanNetwork, VxlanSettings, DEFAULT_VXLAN_GROUP, DEFAULT_VXLAN_PORT};

use serde::{Deserialize, Serialize};

use crate::config::Configuration;
use crate::ip::BasicNetworkAddressGenerator;
use crate::topology::{LinkId, NodeId, Topology, TopologyError};

/// Errors in the device bindings a strategy needs
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("Device {device} on node {node} is already bound to link {other}, cannot bind link {link}")]
    DeviceInUse {
        node: String,
        device: String,
        link: usize,
        other: usize,
    },

    #[error("Node {node} has no device named {device}")]
    UnknownDevice { node: String, device: String },

    #[error("Link {link} ({description}) has no device binding")]
    MissingBinding { link: usize, description: String },

    #[error("No VXLAN underlay device configured for node {node}")]
    MissingUnderlay { node: String },

    #[error("Device {device} on node {node} is bound to direct link {link} and cannot carry VXLAN traffic")]
    UnderlayInUse { node: String, device: String, link: usize },

    #[error("Unknown link: {0}")]
    UnknownLink(usize),

    #[error("The {strategy} network does not support {operation}")]
    Unsupported {
        strategy: &'static str,
        operation: &'static str,
    },
}

/// The active network strategy of a topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NetworkImplementation {
    Direct(DirectNetwork),
    Vxlan(VxlanNetwork),
    Default(DefaultNetwork),
}

impl Default for NetworkImplementation {
    fn default() -> Self {
        NetworkImplementation::Default(DefaultNetwork::default())
    }
}

impl NetworkImplementation {
    pub fn name(&self) -> &'static str {
        match self {
            NetworkImplementation::Direct(_) => "direct",
            NetworkImplementation::Vxlan(_) => "vxlan",
            NetworkImplementation::Default(_) => "default",
        }
    }

    pub fn generator(&self) -> &BasicNetworkAddressGenerator {
        match self {
            NetworkImplementation::Direct(n) => &n.generator,
            NetworkImplementation::Vxlan(n) => &n.generator,
            NetworkImplementation::Default(n) => &n.generator,
        }
    }

    pub fn generator_mut(&mut self) -> &mut BasicNetworkAddressGenerator {
        match self {
            NetworkImplementation::Direct(n) => &mut n.generator,
            NetworkImplementation::Vxlan(n) => &mut n.generator,
            NetworkImplementation::Default(n) => &mut n.generator,
        }
    }

    pub fn symmetric_shaping(&self) -> bool {
        match self {
            NetworkImplementation::Direct(n) => n.symmetric_shaping,
            NetworkImplementation::Vxlan(n) => n.symmetric_shaping,
            NetworkImplementation::Default(n) => n.symmetric_shaping,
        }
    }

    /// Check that `link` can be bound to the given devices.
    pub fn check_link_interface_mapping(
        &self,
        topology: &Topology,
        link: LinkId,
        device1: &str,
        device2: &str,
    ) -> Result<(), BindingError> {
        match self {
            NetworkImplementation::Direct(n) => n.bindings.check(topology, link, device1, device2),
            NetworkImplementation::Default(n) => n.bindings.check(topology, link, device1, device2),
            NetworkImplementation::Vxlan(_) => Err(BindingError::Unsupported {
                strategy: self.name(),
                operation: "link interface mappings",
            }),
        }
    }

    /// Record a binding previously accepted by `check_link_interface_mapping`.
    pub fn record_link_interface_mapping(
        &mut self,
        link: LinkId,
        device1: &str,
        device2: &str,
    ) -> Result<(), BindingError> {
        log::debug!("Binding link {} to devices {} / {}", link, device1, device2);
        match self {
            NetworkImplementation::Direct(n) => {
                n.bindings.insert(link, device1, device2);
                Ok(())
            }
            NetworkImplementation::Default(n) => {
                n.record(link, device1, device2);
                Ok(())
            }
            NetworkImplementation::Vxlan(_) => Err(BindingError::Unsupported {
                strategy: "vxlan",
                operation: "link interface mappings",
            }),
        }
    }

    /// Validate every link and allocate link IDs, VXLAN IDs and device names
    /// in link declaration order.
    pub fn configure(&self, topology: &Topology) -> Result<Allocations, TopologyError> {
        let decisions = match self {
            NetworkImplementation::Direct(n) => n.decide(topology)?,
            NetworkImplementation::Vxlan(n) => n.decide(topology)?,
            NetworkImplementation::Default(n) => n.decide(topology)?,
        };
        let params = match self {
            NetworkImplementation::Direct(_) => VxlanSettings::default().params(),
            NetworkImplementation::Vxlan(n) => n.vxlan.params(),
            NetworkImplementation::Default(n) => n.vxlan.params(),
        };
        let allocations = plan::allocate(topology, decisions, params)?;
        log::debug!("Configured {} network for {} links", self.name(), topology.link_count());
        Ok(allocations)
    }

    /// Append the network commands of `node` to `config`.
    pub fn generate(&self, topology: &Topology, node: NodeId, config: &mut Configuration) -> Result<(), TopologyError> {
        let allocations = topology.allocations()?;
        plan::emit(topology, allocations, node, self.symmetric_shaping(), config);
        Ok(())
    }
}
