//! Network topology module.
//!
//! This module contains the data model of the emulated network: nodes,
//! services, interfaces and links, the [`Topology`] graph that owns them and
//! its document (de)serialization.

pub mod types;
pub mod interface;
pub mod node;
pub mod service;
pub mod link;
pub mod graph;
pub mod document;

// Re-export key types and functions for easier access
pub use types::{InterfaceId, LinkId, NodeId, NodeType, Owner, ServiceId};
pub use interface::{is_valid_interface_name, Interface, InterfaceAddress, LOOPBACK_NAME};
pub use node::{Node, RemoteAccess};
pub use service::Service;
pub use link::{Link, LinkProperties};
pub use graph::{Topology, TopologyError};
pub use document::{
    export_topo, export_topo_yaml, import_topo, import_topo_yaml, load_topology, save_topology,
    TopologyDocument,
};
