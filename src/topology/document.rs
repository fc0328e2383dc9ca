//! Topology documents.
//!
//! A topology is persisted as a JSON (or YAML) document listing nodes,
//! services, links and the network strategy. Polymorphic entries (service
//! kinds, extensions, strategies) carry a `type` discriminator, and
//! importing an exported document reproduces the same document.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;

use super::graph::{Topology, TopologyError};
use super::interface::{Interface, InterfaceAddress, LOOPBACK_NAME};
use super::link::LinkProperties;
use super::node::RemoteAccess;
use super::types::NodeType;
use crate::ip::MacAddress;
use crate::network::NetworkImplementation;
use crate::services::{Extension, ServiceKind};

/// Serialized form of a whole topology
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyDocument {
    pub nodes: Vec<NodeDocument>,
    pub services: Vec<ServiceDocument>,
    pub links: Vec<LinkDocument>,
    pub network_implementation: NetworkImplementation,
    /// Editor state, carried through untouched
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub gui_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    pub name: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    pub ssh_remote: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_work_dir")]
    pub ssh_work_dir: String,
    #[serde(default)]
    pub intfs: Vec<InterfaceDocument>,
}

fn default_ssh_port() -> u16 {
    super::node::DEFAULT_SSH_PORT
}

fn default_work_dir() -> String {
    super::node::DEFAULT_WORK_DIR.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDocument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<MacAddress>,
    #[serde(default)]
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDocument {
    pub name: String,
    pub executor: String,
    #[serde(flatten)]
    pub kind: ServiceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_network: Option<Ipv4Net>,
    #[serde(default)]
    pub intfs: Vec<InterfaceDocument>,
    #[serde(default)]
    pub service_extensions: Vec<ExtensionDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionDocument {
    pub name: String,
    #[serde(flatten)]
    pub extension: Extension,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkDocument {
    pub service1: String,
    pub service2: String,
    pub intf_name1: String,
    pub intf_name2: String,
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub delay_variation: f64,
    #[serde(default)]
    pub delay_correlation: f64,
    #[serde(default)]
    pub loss: f64,
    #[serde(default)]
    pub loss_correlation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
}

impl From<&Interface> for InterfaceDocument {
    fn from(intf: &Interface) -> Self {
        Self {
            name: intf.name.clone(),
            mac_address: intf.mac_address,
            addresses: intf.addresses.clone(),
        }
    }
}

impl TopologyDocument {
    /// Snapshot a topology.
    pub fn from_topology(topo: &Topology) -> Self {
        let nodes = topo
            .nodes()
            .map(|(_, node)| NodeDocument {
                name: node.name.clone(),
                node_type: node.node_type,
                ssh_remote: node.access.ssh_remote.clone(),
                ssh_port: node.access.ssh_port,
                ssh_work_dir: node.access.ssh_work_dir.clone(),
                intfs: node
                    .interfaces
                    .iter()
                    .map(|id| topo.interface(*id))
                    .filter(|intf| !intf.is_loopback())
                    .map(InterfaceDocument::from)
                    .collect(),
            })
            .collect();

        let services = topo
            .services()
            .map(|(_, svc)| ServiceDocument {
                name: svc.name.clone(),
                executor: topo.node(svc.executor).name.clone(),
                kind: svc.kind.clone(),
                main_ip: svc.main_ip,
                main_network: svc.main_network,
                intfs: svc
                    .interfaces
                    .iter()
                    .map(|id| InterfaceDocument::from(topo.interface(*id)))
                    .collect(),
                service_extensions: svc
                    .extensions
                    .iter()
                    .map(|(name, extension)| ExtensionDocument {
                        name: name.clone(),
                        extension: extension.clone(),
                    })
                    .collect(),
            })
            .collect();

        let links = topo
            .links()
            .map(|(_, link)| {
                let props = &link.properties;
                LinkDocument {
                    service1: topo.service(link.service1).name.clone(),
                    service2: topo.service(link.service2).name.clone(),
                    intf_name1: topo.interface(link.interface1).name.clone(),
                    intf_name2: topo.interface(link.interface2).name.clone(),
                    delay: props.delay,
                    delay_variation: props.delay_variation,
                    delay_correlation: props.delay_correlation,
                    loss: props.loss,
                    loss_correlation: props.loss_correlation,
                    rate: props.rate.clone(),
                }
            })
            .collect();

        Self {
            nodes,
            services,
            links,
            network_implementation: topo.network().clone(),
            gui_data: topo.gui_data.clone(),
        }
    }

    /// Rebuild the topology described by this document. The result is not
    /// finalized.
    pub fn into_topology(self) -> Result<Topology, TopologyError> {
        let mut topo = Topology::new(self.network_implementation);

        for node in self.nodes {
            let access = RemoteAccess::new(node.ssh_remote)
                .with_port(node.ssh_port)
                .with_work_dir(node.ssh_work_dir);
            topo.add_node(node.name.clone(), node.node_type, access)?;
            for intf in node.intfs.into_iter().filter(|i| i.name != LOOPBACK_NAME) {
                topo.add_node_interface(&node.name, intf.name, intf.addresses, intf.mac_address)?;
            }
        }

        for svc in self.services {
            let id = topo.add_service(svc.name.clone(), &svc.executor, svc.kind)?;
            for intf in svc.intfs {
                topo.add_service_interface(&svc.name, intf.name, intf.addresses, intf.mac_address)?;
            }
            for ext in svc.service_extensions {
                topo.add_extension(&svc.name, ext.name, ext.extension)?;
            }
            // Absent values keep the address derived from the first interface.
            let service = &mut topo.services[id.index()];
            if let Some(ip) = svc.main_ip {
                service.main_ip = Some(ip);
            }
            if let Some(network) = svc.main_network {
                service.main_network = Some(network);
            }
        }

        for link in self.links {
            let properties = LinkProperties {
                delay: link.delay,
                delay_variation: link.delay_variation,
                delay_correlation: link.delay_correlation,
                loss: link.loss,
                loss_correlation: link.loss_correlation,
                rate: link.rate,
            };
            topo.add_link(&link.service1, &link.intf_name1, &link.service2, &link.intf_name2, properties)?;
        }

        topo.gui_data = self.gui_data;
        Ok(topo)
    }
}

/// Serialize a topology as pretty-printed JSON.
pub fn export_topo(topo: &Topology) -> Result<String, TopologyError> {
    serde_json::to_string_pretty(&TopologyDocument::from_topology(topo))
        .map_err(|e| TopologyError::Document(e.to_string()))
}

/// Rebuild a topology from JSON produced by [`export_topo`].
pub fn import_topo(json: &str) -> Result<Topology, TopologyError> {
    let document: TopologyDocument =
        serde_json::from_str(json).map_err(|e| TopologyError::Document(e.to_string()))?;
    document.into_topology()
}

/// Serialize a topology as YAML.
pub fn export_topo_yaml(topo: &Topology) -> Result<String, TopologyError> {
    serde_yaml::to_string(&TopologyDocument::from_topology(topo))
        .map_err(|e| TopologyError::Document(e.to_string()))
}

/// Rebuild a topology from a YAML document.
pub fn import_topo_yaml(yaml: &str) -> Result<Topology, TopologyError> {
    let document: TopologyDocument =
        serde_yaml::from_str(yaml).map_err(|e| TopologyError::Document(e.to_string()))?;
    document.into_topology()
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Load a topology file, YAML or JSON by extension.
pub fn load_topology(path: &Path) -> Result<Topology, TopologyError> {
    log::info!("Loading topology from: {:?}", path);
    let content = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    if is_yaml(path) {
        import_topo_yaml(&content)
    } else {
        import_topo(&content)
    }
}

/// Write a topology file, YAML or JSON by extension.
pub fn save_topology(topo: &Topology, path: &Path) -> Result<(), TopologyError> {
    let content = if is_yaml(path) { export_topo_yaml(topo)? } else { export_topo(topo)? };
    std::fs::write(path, content).map_err(|source| TopologyError::Io {
        path: path.display().to_string(),
        source,
    })
}
