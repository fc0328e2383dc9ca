//! Service kinds and their configuration.
//!
//! Every service runs in an LXC container on its executor node. The
//! [`ServiceKind`] decides what runs inside and which capabilities the
//! routing engine sees; [`Extension`]s add optional extras on top.

pub mod container;
pub mod extensions;
pub mod lxc;
pub mod ovs;
pub mod ryu;

pub use container::{status_command, LxcImage};
pub use extensions::Extension;
pub use lxc::LxcHost;
pub use ovs::OvsSwitch;
pub use ryu::{RyuController, DEFAULT_OPENFLOW_PORT};

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, Configuration};
use crate::topology::{ServiceId, Topology};

/// What a service runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceKind {
    Lxc(LxcHost),
    OvsSwitch(OvsSwitch),
    RyuController(RyuController),
}

impl Default for ServiceKind {
    fn default() -> Self {
        ServiceKind::Lxc(LxcHost::default())
    }
}

impl ServiceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ServiceKind::Lxc(_) => "lxc",
            ServiceKind::OvsSwitch(_) => "ovs_switch",
            ServiceKind::RyuController(_) => "ryu_controller",
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, ServiceKind::OvsSwitch(_))
    }

    pub fn is_controller(&self) -> bool {
        matches!(self, ServiceKind::RyuController(_))
    }

    pub fn is_switch_exclude(&self, interface: &str) -> bool {
        match self {
            ServiceKind::OvsSwitch(switch) => switch.exclude.iter().any(|e| e == interface),
            _ => false,
        }
    }

    pub fn controllers(&self) -> &[String] {
        match self {
            ServiceKind::OvsSwitch(switch) => &switch.controllers,
            _ => &[],
        }
    }

    /// Port switches connect to, for controllers.
    pub fn controller_port(&self) -> Option<u16> {
        match self {
            ServiceKind::RyuController(controller) => Some(controller.port),
            _ => None,
        }
    }
}

/// Append the commands of `service` and its extensions to `config`.
pub fn append_to_configuration(topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), ConfigError> {
    let svc = topology.service(service);
    let before = config.len();
    match svc.kind() {
        ServiceKind::Lxc(host) => host.append(topology, service, config)?,
        ServiceKind::OvsSwitch(switch) => switch.append(topology, service, config)?,
        ServiceKind::RyuController(controller) => controller.append(topology, service, config)?,
    }
    for extension in svc.extensions().values() {
        extension.append(topology, service, config)?;
    }
    log::debug!(
        "Service {} ({}) added {} command pairs",
        svc.name(),
        svc.kind().type_name(),
        config.len() - before
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigurationBuilder;
    use crate::network::{NetworkImplementation, VxlanNetwork};
    use crate::topology::{LinkProperties, NodeType, RemoteAccess};
    use std::net::Ipv4Addr;

    fn topology() -> Topology {
        let mut topo = Topology::new(NetworkImplementation::Vxlan(VxlanNetwork::default()));
        topo.add_node("n1", NodeType::Ubuntu, RemoteAccess::new("n1")).unwrap();
        topo
    }

    fn starts(config: &Configuration) -> Vec<String> {
        config.start_cmds().iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_kind_tags() {
        let json = serde_json::to_value(ServiceKind::OvsSwitch(OvsSwitch::default())).unwrap();
        assert_eq!(json["type"], "ovs_switch");
        assert_eq!(json["protocols"], "OpenFlow13");

        let kind: ServiceKind = serde_json::from_str(r#"{"type": "ryu_controller"}"#).unwrap();
        assert_eq!(kind.controller_port(), Some(6653));
        assert!(kind.is_controller());
    }

    #[test]
    fn test_image_fields_are_flat() {
        let kind: ServiceKind =
            serde_json::from_str(r#"{"type": "lxc", "distribution": "debian", "release": "bookworm"}"#).unwrap();
        let ServiceKind::Lxc(host) = &kind else {
            panic!("expected an lxc host, got {:?}", kind);
        };
        assert_eq!(host.image.distribution, "debian");
        assert_eq!(host.image.release, "bookworm");

        let json = serde_json::to_value(ServiceKind::RyuController(RyuController::default())).unwrap();
        assert_eq!(json["distribution"], "ubuntu");
        assert_eq!(json["release"], "jammy");
        assert!(json.get("image").is_none());
    }

    #[test]
    fn test_host_container_sequence() {
        let mut topo = topology();
        topo.add_service("a", "n1", ServiceKind::default()).unwrap();
        topo.add_service("b", "n1", ServiceKind::default()).unwrap();
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();

        let builder = ConfigurationBuilder::new(&topo).unwrap();
        let config = builder.build_service(topo.service_id("a").unwrap()).unwrap();
        let cmds = starts(&config);
        assert_eq!(cmds[0], "lxc-create -n a -t download -- --dist ubuntu --release jammy --arch amd64");
        assert_eq!(cmds[1], "lxc-start -n a");
        // Link devices are nb1 nb2 nv3 nv4, so the service veth is ns5.
        assert_eq!(cmds[2], "ip link add ns5 type veth peer name ns5p");
        assert_eq!(cmds[3], "ip link set ns5 master nb1");
        assert!(cmds.contains(&"lxc-attach -n a -- ip link set ns5p name eth0".to_string()));
        assert!(cmds.contains(&"lxc-attach -n a -- ip addr add 10.0.0.2/16 dev eth0".to_string()));
        assert!(cmds.contains(&"lxc-attach -n a -- ip route add 10.0.0.3/32 dev eth0".to_string()));
        assert_eq!(config.stop_cmds()[0].as_str(), "lxc-destroy -n a");
    }

    #[test]
    fn test_switch_connects_to_controller() {
        let mut topo = topology();
        topo.add_service("h", "n1", ServiceKind::default()).unwrap();
        topo.add_service("s", "n1", ServiceKind::OvsSwitch(OvsSwitch::with_controllers(&["c"])))
            .unwrap();
        topo.add_service("c", "n1", ServiceKind::RyuController(RyuController::default())).unwrap();
        topo.add_link("h", "eth0", "s", "p1", LinkProperties::default()).unwrap();
        topo.add_link("s", "ctl", "c", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();

        let builder = ConfigurationBuilder::new(&topo).unwrap();
        let config = builder.build_service(topo.service_id("s").unwrap()).unwrap();
        let cmds = starts(&config);
        let c_ip = topo.interface(topo.service_interface(topo.service_id("c").unwrap(), "eth0").unwrap()).addresses()[0].ip;
        assert!(cmds.contains(&"lxc-attach -n s -- ovs-vsctl add-port br0 p1".to_string()));
        assert!(!cmds.contains(&"lxc-attach -n s -- ovs-vsctl add-port br0 ctl".to_string()));
        assert!(cmds.contains(&format!("lxc-attach -n s -- ovs-vsctl set-controller br0 tcp:{}:6653", c_ip)));
        // Only the controller is routed from the switch.
        assert_eq!(cmds.iter().filter(|c| c.contains("ip route add")).count(), 1);
    }

    #[test]
    fn test_unreachable_controller() {
        let mut topo = topology();
        topo.add_service("s", "n1", ServiceKind::OvsSwitch(OvsSwitch::with_controllers(&["c"])))
            .unwrap();
        topo.add_service("c", "n1", ServiceKind::RyuController(RyuController::default())).unwrap();
        topo.add_service("h", "n1", ServiceKind::default()).unwrap();
        topo.add_link("s", "p1", "h", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();

        let builder = ConfigurationBuilder::new(&topo).unwrap();
        assert!(matches!(
            builder.build_service(topo.service_id("s").unwrap()),
            Err(ConfigError::ControllerUnreachable { .. })
        ));
    }

    #[test]
    fn test_extensions() {
        let mut topo = topology();
        topo.add_service("a", "n1", ServiceKind::default()).unwrap();
        topo.add_extension(
            "a",
            "gre",
            Extension::Tunnel {
                device: "gre1".into(),
                remote: Ipv4Addr::new(192, 0, 2, 1),
                local: None,
                key: Some(7),
            },
        )
        .unwrap();
        topo.add_extension("a", "keys", Extension::AdminAccess { public_key_file: "id.pub".into() })
            .unwrap();
        topo.add_service("b", "n1", ServiceKind::default()).unwrap();
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();

        let builder = ConfigurationBuilder::new(&topo).unwrap();
        let config = builder.build_service(topo.service_id("a").unwrap()).unwrap();
        let cmds = starts(&config);
        assert!(cmds.contains(
            &"lxc-attach -n a -- ip tunnel add gre1 mode gre remote 192.0.2.1 local 10.0.0.2 key 7 ttl 255".to_string()
        ));
        let files = &config.files()["a"];
        assert_eq!(files[0].destination.to_str(), Some("/var/lib/lxc/a/rootfs/root/.ssh/authorized_keys"));
    }

    #[test]
    fn test_tunnel_without_address_fails() {
        let mut topo = topology();
        topo.add_service("a", "n1", ServiceKind::default()).unwrap();
        topo.add_extension(
            "a",
            "gre",
            Extension::Tunnel {
                device: "gre1".into(),
                remote: Ipv4Addr::new(192, 0, 2, 1),
                local: None,
                key: None,
            },
        )
        .unwrap();
        topo.finalize().unwrap();

        let builder = ConfigurationBuilder::new(&topo).unwrap();
        assert!(matches!(
            builder.build_service(topo.service_id("a").unwrap()),
            Err(ConfigError::MissingAddress { .. })
        ));
    }
}
