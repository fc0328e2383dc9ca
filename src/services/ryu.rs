//! Ryu SDN controller.

use serde::{Deserialize, Serialize};

use super::container::{self, attach, LxcImage};
use crate::config::Configuration;
use crate::topology::{ServiceId, Topology, TopologyError};

/// Default OpenFlow listening port.
pub const DEFAULT_OPENFLOW_PORT: u16 = 6653;

fn default_port() -> u16 {
    DEFAULT_OPENFLOW_PORT
}

fn default_apps() -> Vec<String> {
    vec!["ryu.app.simple_switch_13".to_string()]
}

/// A container running `ryu-manager`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RyuController {
    #[serde(flatten)]
    pub image: LxcImage,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_apps")]
    pub apps: Vec<String>,
}

impl Default for RyuController {
    fn default() -> Self {
        Self {
            image: LxcImage::default(),
            port: DEFAULT_OPENFLOW_PORT,
            apps: default_apps(),
        }
    }
}

impl RyuController {
    pub(crate) fn append(&self, topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), TopologyError> {
        let name = topology.service(service).name();
        container::create(config, name, &self.image);
        container::interfaces(topology, service, config)?;
        container::routes(topology, service, false, config);
        config.add_command(
            attach(
                name,
                format!(
                    "sh -c 'nohup ryu-manager --ofp-tcp-listen-port {} {} > /var/log/ryu.log 2>&1 &'",
                    self.port,
                    self.apps.join(" ")
                ),
            ),
            attach(name, "pkill -f ryu-manager"),
        );
        Ok(())
    }
}
