//! Workloads hosted on nodes.

use ipnet::Ipv4Net;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use super::types::{InterfaceId, NodeId};
use crate::services::{Extension, ServiceKind};

/// A workload running on exactly one node.
///
/// What the service does is decided by its [`ServiceKind`]; the routing
/// engine only looks at the capability flags exposed here.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub(crate) name: String,
    pub(crate) executor: NodeId,
    pub(crate) kind: ServiceKind,
    pub(crate) interfaces: Vec<InterfaceId>,
    pub(crate) extensions: BTreeMap<String, Extension>,
    pub(crate) main_ip: Option<Ipv4Addr>,
    pub(crate) main_network: Option<Ipv4Net>,
}

impl Service {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node the service runs on.
    pub fn executor(&self) -> NodeId {
        self.executor
    }

    pub fn kind(&self) -> &ServiceKind {
        &self.kind
    }

    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub fn extensions(&self) -> &BTreeMap<String, Extension> {
        &self.extensions
    }

    pub fn main_ip(&self) -> Option<Ipv4Addr> {
        self.main_ip
    }

    pub fn main_network(&self) -> Option<Ipv4Net> {
        self.main_network
    }

    pub fn is_switch(&self) -> bool {
        self.kind.is_switch()
    }

    pub fn is_controller(&self) -> bool {
        self.kind.is_controller()
    }

    /// Whether the switch must not forward reachability through `interface`.
    pub fn is_switch_exclude(&self, interface: &str) -> bool {
        self.kind.is_switch_exclude(interface)
    }

    /// Names of the controllers registered with this service (switches only).
    pub fn controllers(&self) -> &[String] {
        self.kind.controllers()
    }
}
