//! Topology type definitions.
//!
//! Typed indices into the topology arena, node operating systems and
//! interface ownership.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Position in declaration order.
            pub fn index(&self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

arena_id!(
    /// Index of a [`Node`](super::Node) in its topology.
    NodeId
);
arena_id!(
    /// Index of a [`Service`](super::Service) in its topology.
    ServiceId
);
arena_id!(
    /// Index of an [`Interface`](super::Interface) in its topology.
    InterfaceId
);
arena_id!(
    /// Index of a [`Link`](super::Link), equal to its declaration order.
    LinkId
);

/// Operating system variant of an execution host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    #[default]
    Ubuntu,
    Debian,
    Alpine,
}

/// Exclusive owner of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    Node(NodeId),
    Service(ServiceId),
}

impl Owner {
    pub fn service(&self) -> Option<ServiceId> {
        match self {
            Owner::Service(id) => Some(*id),
            Owner::Node(_) => None,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match self {
            Owner::Node(id) => Some(*id),
            Owner::Service(_) => None,
        }
    }
}
