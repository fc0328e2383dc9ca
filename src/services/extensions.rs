//! Service extensions.
//!
//! Extensions are named add-ons attached to a service. Each contributes its
//! own commands, files or instructions after the service itself.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use super::container::attach;
use crate::config::{Command, ConfigError, Configuration};
use crate::topology::{ServiceId, Topology};

/// A capability add-on of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Extension {
    /// Install `public_key_file` as root's authorized key and run sshd.
    AdminAccess { public_key_file: PathBuf },

    /// GRE tunnel device inside the container.
    Tunnel {
        device: String,
        remote: Ipv4Addr,
        /// Defaults to the service's main address.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        local: Option<Ipv4Addr>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<u32>,
    },

    /// Steps an operator performs by hand.
    Console {
        #[serde(default)]
        start: Vec<String>,
        #[serde(default)]
        stop: Vec<String>,
    },
}

impl Extension {
    pub(crate) fn append(&self, topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), ConfigError> {
        let svc = topology.service(service);
        let name = svc.name();
        match self {
            Extension::AdminAccess { public_key_file } => {
                config.add_file(
                    name,
                    public_key_file.clone(),
                    format!("/var/lib/lxc/{}/rootfs/root/.ssh/authorized_keys", name),
                );
                config.add_command(attach(name, "systemctl start ssh"), attach(name, "systemctl stop ssh"));
            }
            Extension::Tunnel { device, remote, local, key } => {
                let local = local.or(svc.main_ip()).ok_or_else(|| ConfigError::MissingAddress {
                    service: name.to_string(),
                    purpose: "tunnel endpoint",
                })?;
                let key = key.map(|k| format!(" key {}", k)).unwrap_or_default();
                config.add_command(
                    attach(
                        name,
                        format!("ip tunnel add {} mode gre remote {} local {}{} ttl 255", device, remote, local, key),
                    ),
                    attach(name, format!("ip tunnel del {}", device)),
                );
                config.add_command(attach(name, format!("ip link set {} up", device)), Command::none());
            }
            Extension::Console { start, stop } => {
                for step in start {
                    config.add_start_instruction(step.clone());
                }
                for step in stop {
                    config.add_stop_instruction(step.clone());
                }
            }
        }
        Ok(())
    }
}
