//! Direct strategy: links are carried by dedicated physical devices.

use serde::{Deserialize, Serialize};

use super::bindings::{link_nodes, LinkBindings};
use super::plan::Decision;
use super::BindingError;
use crate::ip::BasicNetworkAddressGenerator;
use crate::topology::{LinkId, Topology};

/// Realize every cross-node link over a bound pair of host devices.
///
/// Links between services on the same node are realized locally and need
/// no binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectNetwork {
    #[serde(default)]
    pub generator: BasicNetworkAddressGenerator,
    #[serde(default, skip_serializing_if = "LinkBindings::is_empty")]
    pub bindings: LinkBindings,
    #[serde(default)]
    pub symmetric_shaping: bool,
}

impl DirectNetwork {
    pub fn new(generator: BasicNetworkAddressGenerator) -> Self {
        Self {
            generator,
            ..Default::default()
        }
    }

    pub(crate) fn decide(&self, topology: &Topology) -> Result<Vec<Decision>, BindingError> {
        self.bindings.validate(topology)?;
        topology
            .links()
            .map(|(id, link)| {
                if link.is_loopback() {
                    return Ok(Decision::Loopback);
                }
                if let Some(binding) = self.bindings.get(id) {
                    return Ok(Decision::Direct {
                        device1: binding.device1.clone(),
                        device2: binding.device2.clone(),
                    });
                }
                let (node1, node2) = link_nodes(topology, id);
                if node1 == node2 {
                    Ok(Decision::Local)
                } else {
                    Err(missing_binding(topology, id))
                }
            })
            .collect()
    }
}

pub(crate) fn missing_binding(topology: &Topology, link: LinkId) -> BindingError {
    let l = topology.link(link);
    BindingError::MissingBinding {
        link: link.index(),
        description: format!(
            "{}:{} <-> {}:{}",
            topology.service(l.service1()).name(),
            topology.interface(l.interface1()).name(),
            topology.service(l.service2()).name(),
            topology.interface(l.interface2()).name()
        ),
    }
}
