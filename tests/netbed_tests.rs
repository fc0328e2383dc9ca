//! End-to-end tests through the public API.

use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Mutex;

use netbed::config::{get_delta, Command, Configuration, ConfigurationBuilder};
use netbed::exec::{LiveExporter, OutputConsumer, RemoteExecutor, RemoteTarget};
use netbed::ip::{AddressGenerator, BasicNetworkAddressGenerator};
use netbed::network::{BindingError, DefaultNetwork, DirectNetwork, NetworkImplementation, VxlanNetwork};
use netbed::routing::build_routing_table;
use netbed::services::{LxcHost, OvsSwitch, RyuController, ServiceKind};
use netbed::topology::{export_topo, import_topo, LinkProperties, NodeType, RemoteAccess, Topology, TopologyError};
use netbed::ExecError;

/// Records issued commands in order.
#[derive(Default)]
struct RecordingExecutor {
    issued: Mutex<Vec<String>>,
}

impl RemoteExecutor for RecordingExecutor {
    fn execute(
        &self,
        _target: &RemoteTarget,
        command: &str,
        _consumers: &mut [&mut dyn OutputConsumer],
    ) -> Result<i32, ExecError> {
        self.issued.lock().unwrap().push(command.to_string());
        Ok(0)
    }

    fn transfer(&self, _target: &RemoteTarget, _source: &Path, _destination: &Path) -> Result<(), ExecError> {
        Ok(())
    }
}

fn lab() -> Topology {
    let network = DefaultNetwork::default().with_default_device("eth0");
    let mut topo = Topology::new(NetworkImplementation::Default(network));
    for (node, address) in [("n1", "root@10.10.0.1"), ("n2", "root@10.10.0.2")] {
        topo.add_node(node, NodeType::Ubuntu, RemoteAccess::new(address)).unwrap();
        topo.add_node_interface(node, "eth0", vec![], None).unwrap();
        topo.add_node_interface(node, "eth1", vec![], None).unwrap();
    }
    topo.add_service("h1", "n1", ServiceKind::Lxc(LxcHost::default())).unwrap();
    topo.add_service("h2", "n2", ServiceKind::Lxc(LxcHost::default())).unwrap();
    topo.add_service("s1", "n1", ServiceKind::OvsSwitch(OvsSwitch::with_controllers(&["c1"])))
        .unwrap();
    topo.add_service("c1", "n2", ServiceKind::RyuController(RyuController::default())).unwrap();
    topo.add_link("h1", "eth0", "s1", "p1", LinkProperties::default().with_delay(2.0)).unwrap();
    topo.add_link("s1", "p2", "h2", "eth0", LinkProperties::default().with_rate("100mbit"))
        .unwrap();
    let ctl = topo.add_link("s1", "ctl", "c1", "eth0", LinkProperties::default()).unwrap();
    topo.set_link_interface_mapping(ctl, "eth1", "eth1").unwrap();
    topo
}

#[test]
fn test_export_import_round_trip() {
    let topo = lab();
    let exported = export_topo(&topo).unwrap();
    let imported = import_topo(&exported).unwrap();
    assert_eq!(export_topo(&imported).unwrap(), exported);

    // A finalized topology exports the same document.
    let mut finalized = imported;
    finalized.finalize().unwrap();
    assert_eq!(export_topo(&finalized).unwrap(), exported);
}

#[test]
fn test_every_configuration_is_paired() {
    let mut topo = lab();
    topo.finalize().unwrap();
    let builder = ConfigurationBuilder::new(&topo).unwrap();
    for (_, config) in builder.build_all().unwrap() {
        assert_eq!(config.start_cmds().len(), config.stop_cmds().len());
        assert!(!config.is_empty());
    }
}

#[test]
fn test_network_commands_come_first() {
    let mut topo = lab();
    topo.finalize().unwrap();
    let builder = ConfigurationBuilder::new(&topo).unwrap();
    let n1 = topo.node_id("n1").unwrap();
    let base = builder.build_base(n1).unwrap();
    let full = builder.build(n1).unwrap();
    assert_eq!(&full.start_cmds()[..base.len()], base.start_cmds());
    assert!(full.start_cmds()[base.len()].as_str().starts_with("lxc-create -n h1"));
}

#[test]
fn test_generation_is_deterministic() {
    let build = || {
        let mut topo = lab();
        topo.finalize().unwrap();
        let builder = ConfigurationBuilder::new(&topo).unwrap();
        builder.build_all().unwrap().into_iter().map(|(_, c)| c).collect::<Vec<_>>()
    };
    assert_eq!(build(), build());
}

#[test]
fn test_stop_replays_in_reverse() {
    let mut config = Configuration::new();
    config.add_command("start 1", "stop 1");
    config.add_command("start 2", "stop 2");
    config.add_command("start 3", "stop 3");

    let executor = RecordingExecutor::default();
    let target = RemoteTarget {
        address: "root@n1".into(),
        port: 22,
        work_dir: "/tmp/netbed".into(),
    };
    LiveExporter::new(&executor).stop(&target, &config).unwrap();
    assert_eq!(*executor.issued.lock().unwrap(), vec!["stop 3", "stop 2", "stop 1"]);
}

#[test]
fn test_delta_of_identical_configurations() {
    let mut config = Configuration::new();
    config.add_command("X", "A");
    config.add_command("Y", Command::none());
    config.add_file("h1", "/tmp/key", "/root/.ssh/authorized_keys");

    let delta = get_delta(&config, &config).unwrap();
    assert!(delta.start_cmds().is_empty());
    assert!(delta.stop_cmds().is_empty());
    assert_eq!(delta.files(), config.files());
}

#[test]
fn test_delta_keeps_only_differences() {
    let mut destroy = Configuration::new();
    destroy.add_command("X", "A");
    destroy.add_command("Y", "B");
    let mut create = Configuration::new();
    create.add_command("X", "B");
    create.add_command("Z", "C");
    create.add_file("h1", "/tmp/new", "/etc/new");

    let delta = get_delta(&destroy, &create).unwrap();
    assert_eq!(delta.stop_cmds(), &[Command::new("A")]);
    assert_eq!(delta.start_cmds(), &[Command::new("Z")]);
    assert_eq!(delta.files(), create.files());
}

#[test]
fn test_generators_are_reproducible() {
    let network = "192.168.0.0/24".parse().unwrap();
    let mut first = BasicNetworkAddressGenerator::new(network, 0x02_00_00_00_10_00);
    let mut second = BasicNetworkAddressGenerator::new(network, 0x02_00_00_00_10_00);
    for i in 0..5 {
        let intf = format!("eth{}", i);
        assert_eq!(first.generate_ip("a", &intf), second.generate_ip("x", "y"));
        assert_eq!(first.generate_mac("a", &intf), second.generate_mac("x", "y"));
    }
    let mut fresh = BasicNetworkAddressGenerator::new(network, 0);
    assert_eq!(fresh.generate_ip("a", "eth0").unwrap(), Ipv4Addr::new(192, 168, 0, 2));
}

#[test]
fn test_direct_link_preferred_over_switch() {
    let mut topo = Topology::new(NetworkImplementation::Vxlan(VxlanNetwork::default()));
    topo.add_node("n1", NodeType::Ubuntu, RemoteAccess::new("n1")).unwrap();
    topo.add_service("a", "n1", ServiceKind::default()).unwrap();
    topo.add_service("b", "n1", ServiceKind::default()).unwrap();
    topo.add_service("s", "n1", ServiceKind::OvsSwitch(OvsSwitch::default())).unwrap();
    topo.add_link("a", "eth0", "s", "p1", LinkProperties::default()).unwrap();
    topo.add_link("s", "p2", "b", "eth0", LinkProperties::default()).unwrap();
    topo.add_link("a", "eth1", "b", "eth1", LinkProperties::default()).unwrap();

    let a = topo.service_id("a").unwrap();
    let b = topo.service_id("b").unwrap();
    let b_eth0 = topo.interface(topo.service_interface(b, "eth0").unwrap()).addresses()[0].ip;
    let table = build_routing_table(&topo, a, false);
    let route = table.get(&b_eth0).unwrap();
    assert_eq!(topo.interface(route.interface).name(), "eth1");
}

#[test]
fn test_colliding_mapping_is_rejected() {
    let mut topo = Topology::new(NetworkImplementation::Direct(DirectNetwork::default()));
    topo.add_node("n1", NodeType::Ubuntu, RemoteAccess::new("n1")).unwrap();
    topo.add_node("n2", NodeType::Ubuntu, RemoteAccess::new("n2")).unwrap();
    for node in ["n1", "n2"] {
        topo.add_node_interface(node, "eth1", vec![], None).unwrap();
        topo.add_node_interface(node, "eth2", vec![], None).unwrap();
    }
    topo.add_service("a", "n1", ServiceKind::default()).unwrap();
    topo.add_service("b", "n2", ServiceKind::default()).unwrap();
    let first = topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
    let second = topo.add_link("a", "eth1", "b", "eth1", LinkProperties::default()).unwrap();

    topo.set_link_interface_mapping(first, "eth1", "eth1").unwrap();
    let err = topo.set_link_interface_mapping(second, "eth2", "eth1").unwrap_err();
    assert!(matches!(err, TopologyError::Binding(BindingError::DeviceInUse { ref node, .. }) if node == "n2"));
}
