//! Execution hosts.

use serde::{Deserialize, Serialize};

use super::types::{InterfaceId, NodeType};

/// Default SSH port for remote nodes.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Default working directory on remote nodes.
pub const DEFAULT_WORK_DIR: &str = "/tmp/netbed";

/// How a node is reached. Opaque to the topology, consumed by exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAccess {
    pub ssh_remote: String,
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
    #[serde(default = "default_work_dir")]
    pub ssh_work_dir: String,
}

fn default_ssh_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_work_dir() -> String {
    DEFAULT_WORK_DIR.to_string()
}

impl RemoteAccess {
    pub fn new(ssh_remote: impl Into<String>) -> Self {
        Self {
            ssh_remote: ssh_remote.into(),
            ssh_port: DEFAULT_SSH_PORT,
            ssh_work_dir: DEFAULT_WORK_DIR.to_string(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.ssh_port = port;
        self
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<String>) -> Self {
        self.ssh_work_dir = work_dir.into();
        self
    }
}

/// A physical or virtual host that executes services.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) name: String,
    pub(crate) node_type: NodeType,
    pub(crate) access: RemoteAccess,
    pub(crate) interfaces: Vec<InterfaceId>,
}

impl Node {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn access(&self) -> &RemoteAccess {
        &self.access
    }

    /// Interfaces in declaration order, loopback first.
    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }
}
