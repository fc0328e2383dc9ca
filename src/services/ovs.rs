//! Open vSwitch inside an LXC container.

use serde::{Deserialize, Serialize};

use super::container::{self, attach, LxcImage};
use super::ryu::DEFAULT_OPENFLOW_PORT;
use crate::config::{Command, ConfigError, Configuration};
use crate::routing;
use crate::topology::{ServiceId, Topology};

fn default_protocols() -> String {
    "OpenFlow13".to_string()
}

fn default_bridge() -> String {
    "br0".to_string()
}

/// An OVS bridge whose ports are the service's linked interfaces.
///
/// Interfaces facing a registered controller and interfaces listed in
/// `exclude` are not switch ports; they keep their addresses and carry the
/// switch's own traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OvsSwitch {
    #[serde(flatten)]
    pub image: LxcImage,
    /// Service names of the controllers managing this switch.
    #[serde(default)]
    pub controllers: Vec<String>,
    /// Interface names that are not switch ports.
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default = "default_protocols")]
    pub protocols: String,
    #[serde(default = "default_bridge")]
    pub bridge: String,
}

impl Default for OvsSwitch {
    fn default() -> Self {
        Self {
            image: LxcImage::default(),
            controllers: Vec::new(),
            exclude: Vec::new(),
            protocols: default_protocols(),
            bridge: default_bridge(),
        }
    }
}

impl OvsSwitch {
    pub fn with_controllers(controllers: &[&str]) -> Self {
        Self {
            controllers: controllers.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn append(&self, topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), ConfigError> {
        let svc = topology.service(service);
        let name = svc.name();
        container::create(config, name, &self.image);
        container::interfaces(topology, service, config)?;
        container::routes(topology, service, true, config);

        let bridge = &self.bridge;
        config.add_command(
            attach(name, format!("ovs-vsctl add-br {}", bridge)),
            attach(name, format!("ovs-vsctl del-br {}", bridge)),
        );
        config.add_command(
            attach(name, format!("ovs-vsctl set bridge {} protocols={}", bridge, self.protocols)),
            Command::none(),
        );

        for &id in svc.interfaces() {
            let intf = topology.interface(id).name();
            if topology.bind_name(id).is_none() || self.exclude.iter().any(|e| e == intf) {
                continue;
            }
            let faces_controller = topology
                .other_end_service(id)
                .map(|s| self.controllers.iter().any(|c| c == topology.service(s).name()))
                .unwrap_or(false);
            if faces_controller {
                continue;
            }
            config.add_command(
                attach(name, format!("ovs-vsctl add-port {} {}", bridge, intf)),
                attach(name, format!("ovs-vsctl del-port {} {}", bridge, intf)),
            );
        }

        if !self.controllers.is_empty() {
            let table = routing::build_routing_table(topology, service, true);
            let mut targets = Vec::new();
            for controller in &self.controllers {
                let cid = topology.service_id(controller)?;
                let csvc = topology.service(cid);
                let ip = csvc
                    .interfaces()
                    .iter()
                    .flat_map(|id| topology.interface(*id).addresses())
                    .map(|a| a.ip)
                    .find(|ip| table.contains(ip))
                    .ok_or_else(|| ConfigError::ControllerUnreachable {
                        switch: name.to_string(),
                        controller: controller.clone(),
                    })?;
                let port = csvc.kind().controller_port().unwrap_or(DEFAULT_OPENFLOW_PORT);
                targets.push(format!("tcp:{}:{}", ip, port));
            }
            config.add_command(
                attach(name, format!("ovs-vsctl set-controller {} {}", bridge, targets.join(" "))),
                attach(name, format!("ovs-vsctl del-controller {}", bridge)),
            );
        }
        Ok(())
    }
}
