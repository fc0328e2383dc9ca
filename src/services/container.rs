//! LXC container plumbing shared by every service kind.
//!
//! A container is created from a download template, started, and gets one
//! veth per linked interface: the host end joins the interface's bridge, the
//! peer is moved into the container and renamed to the interface name.

use serde::{Deserialize, Serialize};

use crate::config::{Command, Configuration};
use crate::routing;
use crate::topology::{ServiceId, Topology, TopologyError};

fn default_distribution() -> String {
    "ubuntu".to_string()
}

fn default_release() -> String {
    "jammy".to_string()
}

/// Template image a container is created from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LxcImage {
    #[serde(default = "default_distribution")]
    pub distribution: String,
    #[serde(default = "default_release")]
    pub release: String,
}

impl Default for LxcImage {
    fn default() -> Self {
        Self {
            distribution: default_distribution(),
            release: default_release(),
        }
    }
}

/// `cmd` run inside container `name`.
pub fn attach(name: &str, cmd: impl AsRef<str>) -> String {
    format!("lxc-attach -n {} -- {}", name, cmd.as_ref())
}

/// Command printing the state of container `name`.
pub fn status_command(name: &str) -> String {
    format!("lxc-info -n {} -sH", name)
}

/// Create and start the container.
pub(crate) fn create(config: &mut Configuration, name: &str, image: &LxcImage) {
    config.add_command(
        format!(
            "lxc-create -n {} -t download -- --dist {} --release {} --arch amd64",
            name, image.distribution, image.release
        ),
        format!("lxc-destroy -n {}", name),
    );
    config.add_command(format!("lxc-start -n {}", name), format!("lxc-stop -n {}", name));
}

/// Plug every linked interface of `service` into its bridge.
pub(crate) fn interfaces(topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), TopologyError> {
    let allocations = topology.allocations()?;
    let name = topology.service(service).name();

    for &id in topology.service(service).interfaces() {
        let interface = topology.interface(id);
        let (Some(bridge), Some(host)) = (allocations.bind_name(id), allocations.service_device(id)) else {
            log::debug!("Interface {}:{} is not linked, skipping", name, interface.name());
            continue;
        };
        let peer = format!("{}p", host);
        let intf = interface.name();

        config.add_command(
            format!("ip link add {} type veth peer name {}", host, peer),
            format!("ip link del {}", host),
        );
        config.add_command(
            format!("ip link set {} master {}", host, bridge),
            format!("ip link set {} nomaster", host),
        );
        config.add_command(format!("ip link set {} up", host), Command::none());
        config.add_command(
            format!("ip link set {} netns $(lxc-info -n {} -pH)", peer, name),
            Command::none(),
        );
        config.add_command(attach(name, format!("ip link set {} name {}", peer, intf)), Command::none());
        if let Some(mac) = interface.mac_address() {
            config.add_command(attach(name, format!("ip link set {} address {}", intf, mac)), Command::none());
        }
        for address in interface.addresses() {
            config.add_command(
                attach(name, format!("ip addr add {} dev {}", address.cidr(), intf)),
                attach(name, format!("ip addr del {} dev {}", address.cidr(), intf)),
            );
        }
        config.add_command(
            attach(name, format!("ip link set {} up", intf)),
            attach(name, format!("ip link set {} down", intf)),
        );
    }
    Ok(())
}

/// One host route per reachable address.
pub(crate) fn routes(topology: &Topology, service: ServiceId, for_switch: bool, config: &mut Configuration) {
    let name = topology.service(service).name();
    let table = routing::build_routing_table(topology, service, for_switch);
    for (ip, route) in table.iter() {
        let intf = topology.interface(route.interface).name();
        config.add_command(
            attach(name, format!("ip route add {}/32 dev {}", ip, intf)),
            attach(name, format!("ip route del {}/32 dev {}", ip, intf)),
        );
    }
}
