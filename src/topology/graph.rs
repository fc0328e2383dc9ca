//! The topology graph.
//!
//! A [`Topology`] owns every node, service, interface and link in arena
//! vectors and refers between them by index. Construction happens in one
//! mutable phase; [`Topology::finalize`] then runs the network strategy's
//! `configure` step once and freezes the structure. The resulting
//! [`Allocations`] side table is kept next to the graph and never written to
//! the graph entities themselves.

use ipnet::Ipv4Net;
use std::collections::HashMap;
use std::net::Ipv4Addr;

use super::interface::{is_valid_interface_name, Interface, InterfaceAddress, LOOPBACK_NAME};
use super::link::{Link, LinkProperties};
use super::node::{Node, RemoteAccess};
use super::service::Service;
use super::types::{InterfaceId, LinkId, NodeId, NodeType, Owner, ServiceId};
use crate::ip::{AddressGenerator, AllocationError, BasicNetworkAddressGenerator, MacAddress};
use crate::network::{Allocations, BindingError, NetworkImplementation};
use crate::services::{Extension, ServiceKind};

/// Model-integrity errors
#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown link: {0}")]
    UnknownLink(usize),

    #[error("Interface {name} already exists on {owner}")]
    InterfaceExists { owner: String, name: String },

    #[error("Interface {name} on {owner} is already linked")]
    InterfaceInUse { owner: String, name: String },

    #[error("Invalid interface name: {0:?}")]
    InvalidInterfaceName(String),

    #[error("Invalid link {service1}:{interface1} <-> {service2}:{interface2}: {reason}")]
    InvalidLink {
        service1: String,
        interface1: String,
        service2: String,
        interface2: String,
        reason: String,
    },

    #[error("Topology is finalized and can no longer be modified")]
    Finalized,

    #[error("Topology has not been finalized yet")]
    NotConfigured,

    #[error("Invalid topology document: {0}")]
    Document(String),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Binding(#[from] BindingError),
}

/// The complete declared graph of one emulated network.
#[derive(Debug, Clone)]
pub struct Topology {
    pub(crate) nodes: Vec<Node>,
    node_index: HashMap<String, NodeId>,
    pub(crate) services: Vec<Service>,
    service_index: HashMap<String, ServiceId>,
    pub(crate) interfaces: Vec<Interface>,
    pub(crate) links: Vec<Link>,
    network: NetworkImplementation,
    allocations: Option<Allocations>,
    pub(crate) gui_data: serde_json::Value,
}

impl Topology {
    /// Create an empty topology realized through `network`.
    pub fn new(network: NetworkImplementation) -> Self {
        Self {
            nodes: Vec::new(),
            node_index: HashMap::new(),
            services: Vec::new(),
            service_index: HashMap::new(),
            interfaces: Vec::new(),
            links: Vec::new(),
            network,
            allocations: None,
            gui_data: serde_json::Value::Null,
        }
    }

    fn ensure_mutable(&self) -> Result<(), TopologyError> {
        if self.allocations.is_some() {
            Err(TopologyError::Finalized)
        } else {
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Register a node. Every node gets an implicit loopback interface.
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        node_type: NodeType,
        access: RemoteAccess,
    ) -> Result<NodeId, TopologyError> {
        self.ensure_mutable()?;
        let name = name.into();
        if self.node_index.contains_key(&name) {
            return Err(TopologyError::DuplicateName { kind: "node", name });
        }

        let id = NodeId(self.nodes.len());
        let loopback = InterfaceId(self.interfaces.len());
        self.interfaces.push(Interface::new(
            LOOPBACK_NAME,
            Owner::Node(id),
            vec![InterfaceAddress::loopback()],
            None,
        ));
        self.nodes.push(Node {
            name: name.clone(),
            node_type,
            access,
            interfaces: vec![loopback],
        });
        self.node_index.insert(name, id);
        Ok(id)
    }

    /// Declare a physical device on a node.
    pub fn add_node_interface(
        &mut self,
        node: &str,
        name: impl Into<String>,
        addresses: Vec<InterfaceAddress>,
        mac_address: Option<MacAddress>,
    ) -> Result<InterfaceId, TopologyError> {
        self.ensure_mutable()?;
        let node_id = self.node_id(node)?;
        let name = name.into();
        if !is_valid_interface_name(&name) {
            return Err(TopologyError::InvalidInterfaceName(name));
        }
        if self.node_interface(node_id, &name).is_some() {
            return Err(TopologyError::InterfaceExists { owner: node.to_string(), name });
        }

        let id = InterfaceId(self.interfaces.len());
        self.interfaces.push(Interface::new(name, Owner::Node(node_id), addresses, mac_address));
        self.nodes[node_id.0].interfaces.push(id);
        Ok(id)
    }

    /// Register a service on an already registered node.
    pub fn add_service(
        &mut self,
        name: impl Into<String>,
        executor: &str,
        kind: ServiceKind,
    ) -> Result<ServiceId, TopologyError> {
        self.ensure_mutable()?;
        let name = name.into();
        if self.service_index.contains_key(&name) {
            return Err(TopologyError::DuplicateName { kind: "service", name });
        }
        let executor = self.node_id(executor)?;

        let id = ServiceId(self.services.len());
        self.services.push(Service {
            name: name.clone(),
            executor,
            kind,
            interfaces: Vec::new(),
            extensions: Default::default(),
            main_ip: None,
            main_network: None,
        });
        self.service_index.insert(name, id);
        Ok(id)
    }

    /// Add an interface with explicit addresses to a service.
    pub fn add_service_interface(
        &mut self,
        service: &str,
        name: impl Into<String>,
        addresses: Vec<InterfaceAddress>,
        mac_address: Option<MacAddress>,
    ) -> Result<InterfaceId, TopologyError> {
        self.ensure_mutable()?;
        let service_id = self.service_id(service)?;
        let name = name.into();
        if !is_valid_interface_name(&name) {
            return Err(TopologyError::InvalidInterfaceName(name));
        }
        if self.service_interface(service_id, &name).is_some() {
            return Err(TopologyError::InterfaceExists { owner: service.to_string(), name });
        }
        Ok(self.push_service_interface(service_id, name, addresses, mac_address))
    }

    fn push_service_interface(
        &mut self,
        service: ServiceId,
        name: String,
        addresses: Vec<InterfaceAddress>,
        mac_address: Option<MacAddress>,
    ) -> InterfaceId {
        let id = InterfaceId(self.interfaces.len());
        let svc = &mut self.services[service.0];
        if svc.main_ip.is_none() {
            if let Some(first) = addresses.first() {
                svc.main_ip = Some(first.ip);
                svc.main_network = Some(first.network);
            }
        }
        svc.interfaces.push(id);
        self.interfaces.push(Interface::new(name, Owner::Service(service), addresses, mac_address));
        id
    }

    /// Attach a named extension to a service.
    pub fn add_extension(
        &mut self,
        service: &str,
        name: impl Into<String>,
        extension: Extension,
    ) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let service_id = self.service_id(service)?;
        let name = name.into();
        let svc = &mut self.services[service_id.0];
        if svc.extensions.contains_key(&name) {
            return Err(TopologyError::DuplicateName { kind: "extension", name });
        }
        svc.extensions.insert(name, extension);
        Ok(())
    }

    /// Override the address a service is primarily reached at.
    pub fn set_main_address(&mut self, service: &str, ip: Ipv4Addr, network: Ipv4Net) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let service_id = self.service_id(service)?;
        let svc = &mut self.services[service_id.0];
        svc.main_ip = Some(ip);
        svc.main_network = Some(network);
        Ok(())
    }

    /// Connect two service interfaces.
    ///
    /// Interfaces that do not exist yet are created with an address, network
    /// and MAC drawn from the network strategy's generator.
    pub fn add_link(
        &mut self,
        service1: &str,
        interface1: &str,
        service2: &str,
        interface2: &str,
        properties: LinkProperties,
    ) -> Result<LinkId, TopologyError> {
        self.ensure_mutable()?;
        let invalid = |reason: String| TopologyError::InvalidLink {
            service1: service1.to_string(),
            interface1: interface1.to_string(),
            service2: service2.to_string(),
            interface2: interface2.to_string(),
            reason,
        };
        properties.validate().map_err(invalid)?;

        let sid1 = self.service_id(service1)?;
        let sid2 = self.service_id(service2)?;
        let loopback = sid1 == sid2 && interface1 == interface2;

        // Both ends are checked and addressed before anything is recorded.
        let existing1 = self.check_endpoint(sid1, interface1)?;
        let existing2 = if loopback { existing1 } else { self.check_endpoint(sid2, interface2)? };

        let mut generator = self.network.generator().clone();
        let end1 = match existing1 {
            Some(id) => Endpoint::Existing(id),
            None => draw_endpoint(&mut generator, service1, interface1)?,
        };
        let end2 = match existing2 {
            _ if loopback => None,
            Some(id) => Some(Endpoint::Existing(id)),
            None => Some(draw_endpoint(&mut generator, service2, interface2)?),
        };
        *self.network.generator_mut() = generator;

        let intf1 = self.attach_endpoint(sid1, interface1, end1);
        let intf2 = match end2 {
            Some(end2) => self.attach_endpoint(sid2, interface2, end2),
            None => intf1,
        };

        let id = LinkId(self.links.len());
        self.links.push(Link {
            service1: sid1,
            service2: sid2,
            interface1: intf1,
            interface2: intf2,
            properties,
        });
        self.interfaces[intf1.0].other_end = Some(intf2);
        self.interfaces[intf2.0].other_end = Some(intf1);
        self.interfaces[intf1.0].links.push(id);
        self.interfaces[intf2.0].links.push(id);

        log::debug!("Declared link {} {}:{} <-> {}:{}", id, service1, interface1, service2, interface2);
        Ok(id)
    }

    /// Existing unlinked interface a new link attaches to, or `None` when a
    /// valid name will be created on demand.
    fn check_endpoint(&self, service: ServiceId, name: &str) -> Result<Option<InterfaceId>, TopologyError> {
        if let Some(existing) = self.service_interface(service, name) {
            if self.interfaces[existing.0].other_end.is_some() {
                return Err(TopologyError::InterfaceInUse {
                    owner: self.services[service.0].name.clone(),
                    name: name.to_string(),
                });
            }
            return Ok(Some(existing));
        }
        if !is_valid_interface_name(name) {
            return Err(TopologyError::InvalidInterfaceName(name.to_string()));
        }
        Ok(None)
    }

    fn attach_endpoint(&mut self, service: ServiceId, name: &str, endpoint: Endpoint) -> InterfaceId {
        match endpoint {
            Endpoint::Existing(id) => id,
            Endpoint::Fresh(address, mac) => {
                self.push_service_interface(service, name.to_string(), vec![address], Some(mac))
            }
        }
    }

    /// Bind a link to physical devices on the nodes executing its endpoints.
    pub fn set_link_interface_mapping(
        &mut self,
        link: LinkId,
        device1: &str,
        device2: &str,
    ) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        if link.0 >= self.links.len() {
            return Err(TopologyError::UnknownLink(link.0));
        }
        self.network.check_link_interface_mapping(self, link, device1, device2)?;
        self.network.record_link_interface_mapping(link, device1, device2)?;
        Ok(())
    }

    /// Strategy settings may be changed until the topology is finalized.
    pub fn network_mut(&mut self) -> Result<&mut NetworkImplementation, TopologyError> {
        self.ensure_mutable()?;
        Ok(&mut self.network)
    }

    /// Run the network strategy's `configure` step and freeze the structure.
    pub fn finalize(&mut self) -> Result<(), TopologyError> {
        self.ensure_mutable()?;
        let allocations = self.network.configure(self)?;
        log::info!(
            "Finalized topology: {} nodes, {} services, {} links",
            self.nodes.len(),
            self.services.len(),
            self.links.len()
        );
        self.allocations = Some(allocations);
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.allocations.is_some()
    }

    // ------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------

    pub fn node_id(&self, name: &str) -> Result<NodeId, TopologyError> {
        self.node_index
            .get(name)
            .copied()
            .ok_or_else(|| TopologyError::UnknownNode(name.to_string()))
    }

    pub fn service_id(&self, name: &str) -> Result<ServiceId, TopologyError> {
        self.service_index
            .get(name)
            .copied()
            .ok_or_else(|| TopologyError::UnknownService(name.to_string()))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    pub fn interface(&self, id: InterfaceId) -> &Interface {
        &self.interfaces[id.0]
    }

    pub fn link(&self, id: LinkId) -> &Link {
        &self.links[id.0]
    }

    /// Nodes in registration order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Services in registration order.
    pub fn services(&self) -> impl Iterator<Item = (ServiceId, &Service)> {
        self.services.iter().enumerate().map(|(i, s)| (ServiceId(i), s))
    }

    /// Services executed by `node`, in registration order.
    pub fn services_on(&self, node: NodeId) -> impl Iterator<Item = (ServiceId, &Service)> {
        self.services().filter(move |(_, s)| s.executor == node)
    }

    /// Links in declaration order.
    pub fn links(&self) -> impl Iterator<Item = (LinkId, &Link)> {
        self.links.iter().enumerate().map(|(i, l)| (LinkId(i), l))
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn node_interface(&self, node: NodeId, name: &str) -> Option<InterfaceId> {
        self.nodes[node.0]
            .interfaces
            .iter()
            .copied()
            .find(|id| self.interfaces[id.0].name == name)
    }

    pub fn service_interface(&self, service: ServiceId, name: &str) -> Option<InterfaceId> {
        self.services[service.0]
            .interfaces
            .iter()
            .copied()
            .find(|id| self.interfaces[id.0].name == name)
    }

    /// Service owning `interface`, if a service owns it.
    pub fn interface_service(&self, interface: InterfaceId) -> Option<ServiceId> {
        self.interfaces[interface.0].owner.service()
    }

    pub fn other_end(&self, interface: InterfaceId) -> Option<InterfaceId> {
        self.interfaces[interface.0].other_end
    }

    /// Service at the far side of the link using `interface`.
    pub fn other_end_service(&self, interface: InterfaceId) -> Option<ServiceId> {
        self.other_end(interface).and_then(|far| self.interface_service(far))
    }

    /// Node executing the service that owns `interface`, or the owning node.
    pub fn interface_node(&self, interface: InterfaceId) -> NodeId {
        match self.interfaces[interface.0].owner {
            Owner::Node(node) => node,
            Owner::Service(service) => self.services[service.0].executor,
        }
    }

    pub fn network(&self) -> &NetworkImplementation {
        &self.network
    }

    /// Allocation side table; available once finalized.
    pub fn allocations(&self) -> Result<&Allocations, TopologyError> {
        self.allocations.as_ref().ok_or(TopologyError::NotConfigured)
    }

    /// Host-level device name chosen for `interface` by the network strategy.
    pub fn bind_name(&self, interface: InterfaceId) -> Option<&str> {
        self.allocations.as_ref().and_then(|a| a.bind_name(interface))
    }

    /// Link ID assigned during `configure`; `None` until then.
    pub fn link_id(&self, link: LinkId) -> Option<u32> {
        self.allocations.as_ref().and_then(|a| a.link_id(link))
    }

    pub fn gui_data(&self) -> &serde_json::Value {
        &self.gui_data
    }

    pub fn set_gui_data(&mut self, gui_data: serde_json::Value) {
        self.gui_data = gui_data;
    }
}

/// Where one end of a new link attaches.
enum Endpoint {
    Existing(InterfaceId),
    Fresh(InterfaceAddress, MacAddress),
}

fn draw_endpoint(
    generator: &mut BasicNetworkAddressGenerator,
    service: &str,
    interface: &str,
) -> Result<Endpoint, TopologyError> {
    let ip = generator.generate_ip(service, interface)?;
    let network = generator.generate_network(service, interface)?;
    let mac = generator.generate_mac(service, interface)?;
    Ok(Endpoint::Fresh(InterfaceAddress::new(ip, network), mac))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::VxlanNetwork;
    use crate::services::LxcHost;
    use crate::topology::export_topo;
    use pretty_assertions::assert_eq;

    fn topology() -> Topology {
        let mut topo = Topology::new(NetworkImplementation::Vxlan(VxlanNetwork::default()));
        topo.add_node("n1", NodeType::Ubuntu, RemoteAccess::new("root@n1")).unwrap();
        topo.add_node_interface("n1", "eth0", vec![], None).unwrap();
        topo.add_service("a", "n1", ServiceKind::Lxc(LxcHost::default())).unwrap();
        topo.add_service("b", "n1", ServiceKind::Lxc(LxcHost::default())).unwrap();
        topo
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut topo = topology();
        assert!(matches!(
            topo.add_node("n1", NodeType::Debian, RemoteAccess::new("x")),
            Err(TopologyError::DuplicateName { kind: "node", .. })
        ));
        assert!(matches!(
            topo.add_service("a", "n1", ServiceKind::Lxc(LxcHost::default())),
            Err(TopologyError::DuplicateName { kind: "service", .. })
        ));
        assert!(matches!(
            topo.add_node_interface("n1", "eth0", vec![], None),
            Err(TopologyError::InterfaceExists { .. })
        ));
    }

    #[test]
    fn test_service_requires_known_executor() {
        let mut topo = topology();
        assert!(matches!(
            topo.add_service("c", "nowhere", ServiceKind::Lxc(LxcHost::default())),
            Err(TopologyError::UnknownNode(name)) if name == "nowhere"
        ));
    }

    #[test]
    fn test_nodes_have_loopback() {
        let topo = topology();
        let n1 = topo.node_id("n1").unwrap();
        let lo = topo.node_interface(n1, LOOPBACK_NAME).unwrap();
        assert!(topo.interface(lo).is_loopback());
        assert_eq!(topo.interface(lo).addresses()[0].ip, Ipv4Addr::LOCALHOST);
        assert_eq!(topo.node(n1).interfaces().len(), 2);
    }

    #[test]
    fn test_link_wires_both_ends() {
        let mut topo = topology();
        let link = topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        let l = topo.link(link);
        assert_eq!(topo.other_end(l.interface1()), Some(l.interface2()));
        assert_eq!(topo.other_end(l.interface2()), Some(l.interface1()));
        assert_eq!(topo.other_end_service(l.interface1()), Some(topo.service_id("b").unwrap()));
        assert_eq!(topo.interface(l.interface1()).links(), &[link]);

        // On-demand interfaces draw from the generator.
        let a = topo.service(topo.service_id("a").unwrap());
        assert_eq!(a.main_ip(), Some(Ipv4Addr::new(10, 0, 0, 2)));
        let b_intf = topo.interface(l.interface2());
        assert_eq!(b_intf.addresses()[0].ip, Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(b_intf.mac_address().unwrap().to_string(), "02:00:00:00:00:01");
        assert_eq!(topo.link_id(link), None);
    }

    #[test]
    fn test_linked_interface_cannot_be_reused() {
        let mut topo = topology();
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        assert!(matches!(
            topo.add_link("a", "eth0", "b", "eth1", LinkProperties::default()),
            Err(TopologyError::InterfaceInUse { .. })
        ));
    }

    #[test]
    fn test_rejected_link_leaves_topology_untouched() {
        let mut topo = topology();
        topo.add_service("c", "n1", ServiceKind::Lxc(LxcHost::default())).unwrap();
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        let before = export_topo(&topo).unwrap();

        // Second end already linked.
        assert!(matches!(
            topo.add_link("c", "eth0", "b", "eth0", LinkProperties::default()),
            Err(TopologyError::InterfaceInUse { .. })
        ));
        // Second end has an unusable name.
        assert!(matches!(
            topo.add_link("c", "eth0", "a", "this-name-is-too-long", LinkProperties::default()),
            Err(TopologyError::InvalidInterfaceName(_))
        ));
        assert_eq!(export_topo(&topo).unwrap(), before);

        // Allocation continues where it left off.
        let link = topo.add_link("c", "eth0", "a", "eth1", LinkProperties::default()).unwrap();
        let c_intf = topo.interface(topo.link(link).interface1());
        assert_eq!(c_intf.addresses()[0].ip, Ipv4Addr::new(10, 0, 0, 4));
    }

    #[test]
    fn test_loopback_link_shares_interface() {
        let mut topo = topology();
        let link = topo.add_link("a", "lo0", "a", "lo0", LinkProperties::default()).unwrap();
        let l = topo.link(link);
        assert!(l.is_loopback());
        assert_eq!(topo.interface(l.interface1()).links().len(), 2);
        assert_eq!(topo.other_end(l.interface1()), Some(l.interface1()));
    }

    #[test]
    fn test_invalid_link_properties() {
        let mut topo = topology();
        let props = LinkProperties::default().with_loss(2.0, 0.0);
        assert!(matches!(
            topo.add_link("a", "eth0", "b", "eth0", props),
            Err(TopologyError::InvalidLink { .. })
        ));
        assert!(topo.add_link("a", "this-name-is-too-long", "b", "eth0", LinkProperties::default()).is_err());
    }

    #[test]
    fn test_finalize_freezes_structure() {
        let mut topo = topology();
        assert!(matches!(topo.allocations(), Err(TopologyError::NotConfigured)));
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();
        assert!(topo.is_finalized());
        assert_eq!(topo.link_id(LinkId(0)), Some(1));
        assert!(matches!(
            topo.add_node("n2", NodeType::Ubuntu, RemoteAccess::new("n2")),
            Err(TopologyError::Finalized)
        ));
        assert!(matches!(topo.finalize(), Err(TopologyError::Finalized)));
    }
}
