//! Low-level `ip` command pairs.
//!
//! Every helper appends its start command together with the command undoing
//! it, or a placeholder when the reverse happens implicitly (a device going
//! down with its deletion, for instance).

use std::net::Ipv4Addr;

use crate::config::{Command, Configuration};

/// Create a bridge and bring it up.
pub fn bridge(config: &mut Configuration, name: &str) {
    config.add_command(
        format!("ip link add name {} type bridge", name),
        format!("ip link del {}", name),
    );
    config.add_command(format!("ip link set {} up", name), format!("ip link set {} down", name));
}

/// Create a veth pair. Deleting one end removes both.
pub fn veth_pair(config: &mut Configuration, name: &str, peer: &str) {
    config.add_command(
        format!("ip link add {} type veth peer name {}", name, peer),
        format!("ip link del {}", name),
    );
}

/// Enslave `device` to `bridge`.
pub fn attach(config: &mut Configuration, device: &str, bridge: &str) {
    config.add_command(
        format!("ip link set {} master {}", device, bridge),
        format!("ip link set {} nomaster", device),
    );
}

/// Bring a device up.
pub fn up(config: &mut Configuration, device: &str) {
    config.add_command(format!("ip link set {} up", device), Command::none());
}

/// Create a multicast VXLAN device over `underlay`.
pub fn vxlan(config: &mut Configuration, name: &str, vni: u32, group: Ipv4Addr, underlay: &str, port: u16) {
    config.add_command(
        format!(
            "ip link add {} type vxlan id {} group {} dev {} dstport {}",
            name, vni, group, underlay, port
        ),
        format!("ip link del {}", name),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_pairs() {
        let mut config = Configuration::new();
        bridge(&mut config, "nb1");
        assert_eq!(config.start_cmds()[0].as_str(), "ip link add name nb1 type bridge");
        assert_eq!(config.stop_cmds()[0].as_str(), "ip link del nb1");
        assert_eq!(config.start_cmds()[1].as_str(), "ip link set nb1 up");
        assert_eq!(config.stop_cmds()[1].as_str(), "ip link set nb1 down");
    }

    #[test]
    fn test_vxlan_command() {
        let mut config = Configuration::new();
        vxlan(&mut config, "nx1", 100, Ipv4Addr::new(239, 1, 1, 1), "eth1", 4789);
        assert_eq!(
            config.start_cmds()[0].as_str(),
            "ip link add nx1 type vxlan id 100 group 239.1.1.1 dev eth1 dstport 4789"
        );
        assert_eq!(config.stop_cmds()[0].as_str(), "ip link del nx1");
    }
}
