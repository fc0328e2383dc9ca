//! # Netbed - Network emulation testbed
//!
//! This library models a virtual network topology and compiles it into the
//! host-level shell commands that bring it up and tear it down on a set of
//! remote nodes.
//!
//! ## Overview
//!
//! A topology consists of nodes (physical or virtual hosts), services
//! running on them (LXC containers, Open vSwitch switches, Ryu controllers)
//! and links between service interfaces. A network strategy decides how each
//! link is realized on the hosts: a local bridge and veth pair, a bridge over
//! a dedicated physical device, or a VXLAN overlay.
//!
//! ## Key Features
//!
//! - **Deterministic allocation**: IPs, MACs, link IDs and VXLAN IDs come from
//!   monotonic counters, so the same topology always yields the same commands
//! - **Reversible configurations**: every start command is paired with the
//!   command undoing it; teardown replays the pairs in reverse
//! - **Pluggable strategies**: Direct, VXLAN or a per-link mix of both
//! - **Reachability engine**: per-service routing tables over the link graph,
//!   aware of switches and their controllers
//! - **Remote execution**: export to scripts or run live over SSH
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `ip`: address, MAC and identifier allocators
//! - `topology`: the topology graph and its JSON/YAML documents
//! - `network`: network strategies and the allocation side table
//! - `config`: configurations, the configuration builder and deltas
//! - `routing`: routing tables
//! - `services`: service kinds and extensions
//! - `exec`: exporters and remote executors
//! - `settings`: runner settings
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use netbed::config::ConfigurationBuilder;
//! use netbed::network::{NetworkImplementation, VxlanNetwork};
//! use netbed::services::{LxcHost, ServiceKind};
//! use netbed::topology::{LinkProperties, NodeType, RemoteAccess, Topology};
//!
//! let network = VxlanNetwork::default().with_default_device("eth0");
//! let mut topo = Topology::new(NetworkImplementation::Vxlan(network));
//! topo.add_node("n1", NodeType::Ubuntu, RemoteAccess::new("root@10.1.0.1"))?;
//! topo.add_node_interface("n1", "eth0", vec![], None)?;
//! topo.add_service("h1", "n1", ServiceKind::Lxc(LxcHost::default()))?;
//! topo.add_service("h2", "n1", ServiceKind::Lxc(LxcHost::default()))?;
//! topo.add_link("h1", "eth0", "h2", "eth0", LinkProperties::default().with_delay(10.0))?;
//! topo.finalize()?;
//!
//! let builder = ConfigurationBuilder::new(&topo)?;
//! let config = builder.build(topo.node_id("n1")?)?;
//! for cmd in config.start_cmds() {
//!     println!("{}", cmd);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Topology Format
//!
//! Topologies are stored as JSON or YAML documents:
//!
//! ```yaml
//! nodes:
//!   - name: n1
//!     type: ubuntu
//!     ssh_remote: root@10.1.0.1
//! services:
//!   - name: h1
//!     executor: n1
//!     type: lxc
//! links:
//!   - service1: h1
//!     service2: h2
//!     intf_name1: eth0
//!     intf_name2: eth0
//!     delay: 10.0
//! network_implementation:
//!   type: vxlan
//!   default_device: eth0
//! ```
//!
//! ## Error Handling
//!
//! Every module defines its own `thiserror` error type and returns it as a
//! `Result`. The `netbed` binary wraps them with `color_eyre` context.

pub mod config;
pub mod exec;
pub mod ip;
pub mod network;
pub mod routing;
pub mod services;
pub mod settings;
pub mod topology;

// Re-export commonly used types
pub use config::{ConfigError, Configuration, ConfigurationBuilder};
pub use exec::ExecError;
pub use network::{BindingError, NetworkImplementation};
pub use topology::{Topology, TopologyError};
