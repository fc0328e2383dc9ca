//! Driving every node of a topology.
//!
//! Configurations are built up front on the calling thread; only the
//! execution phase fans out, one rayon task per node.

use rayon::prelude::*;

use super::{ExecError, LiveExporter, RemoteExecutor, RemoteTarget};
use crate::config::{Configuration, ConfigurationBuilder};
use crate::topology::Topology;

/// Built configuration of one node with its target.
struct Job {
    node: String,
    target: RemoteTarget,
    config: Configuration,
}

fn jobs(topology: &Topology) -> Result<Vec<Job>, ExecError> {
    let builder = ConfigurationBuilder::new(topology)?;
    Ok(builder
        .build_all()?
        .into_iter()
        .map(|(id, config)| {
            let node = topology.node(id);
            Job {
                node: node.name().to_string(),
                target: RemoteTarget::from_node(node),
                config,
            }
        })
        .collect())
}

fn run<T, F>(jobs: &[Job], parallel: bool, f: F) -> Vec<(String, Result<T, ExecError>)>
where
    T: Send,
    F: Fn(&Job) -> Result<T, ExecError> + Sync,
{
    if parallel {
        jobs.par_iter().map(|job| (job.node.clone(), f(job))).collect()
    } else {
        jobs.iter().map(|job| (job.node.clone(), f(job))).collect()
    }
}

/// Start every node. All nodes are attempted; any failure fails the call.
pub fn start_all<E: RemoteExecutor>(topology: &Topology, executor: &E, parallel: bool) -> Result<(), ExecError> {
    let jobs = jobs(topology)?;
    let exporter = LiveExporter::new(executor);
    let results = run(&jobs, parallel, |job| exporter.start(&job.target, &job.config));

    let mut failed = 0;
    for (node, result) in &results {
        if let Err(e) = result {
            log::error!("Failed to start node {}: {}", node, e);
            failed += 1;
        }
    }
    if failed > 0 {
        return Err(ExecError::Nodes { failed, total: results.len() });
    }
    log::info!("Started {} nodes", results.len());
    Ok(())
}

/// Stop every node and return the number of failed stop commands.
pub fn stop_all<E: RemoteExecutor>(topology: &Topology, executor: &E, parallel: bool) -> Result<usize, ExecError> {
    let jobs = jobs(topology)?;
    let exporter = LiveExporter::new(executor);
    let results = run(&jobs, parallel, |job| exporter.stop(&job.target, &job.config));

    let mut failed_commands = 0;
    for (node, result) in results {
        match result {
            Ok(count) => failed_commands += count,
            Err(e) => return Err(e),
        }
        log::debug!("Node {} stopped", node);
    }
    Ok(failed_commands)
}

/// Container state of every service, in registration order.
pub fn status_all<E: RemoteExecutor>(
    topology: &Topology,
    executor: &E,
    parallel: bool,
) -> Vec<(String, Result<String, ExecError>)> {
    let exporter = LiveExporter::new(executor);
    let query = |(name, target): &(String, RemoteTarget)| (name.clone(), exporter.status(target, name));
    let services: Vec<(String, RemoteTarget)> = topology
        .services()
        .map(|(_, svc)| {
            (
                svc.name().to_string(),
                RemoteTarget::from_node(topology.node(svc.executor())),
            )
        })
        .collect();
    if parallel {
        services.par_iter().map(query).collect()
    } else {
        services.iter().map(query).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::FakeExecutor;
    use crate::network::{NetworkImplementation, VxlanNetwork};
    use crate::services::ServiceKind;
    use crate::topology::{LinkProperties, NodeType, RemoteAccess};

    fn topology() -> Topology {
        let network = VxlanNetwork::default().with_default_device("eth0");
        let mut topo = Topology::new(NetworkImplementation::Vxlan(network));
        for node in ["n1", "n2"] {
            topo.add_node(node, NodeType::Ubuntu, RemoteAccess::new(format!("root@{}", node))).unwrap();
            topo.add_node_interface(node, "eth0", vec![], None).unwrap();
        }
        topo.add_service("a", "n1", ServiceKind::default()).unwrap();
        topo.add_service("b", "n2", ServiceKind::default()).unwrap();
        topo.add_link("a", "eth0", "b", "eth0", LinkProperties::default()).unwrap();
        topo.finalize().unwrap();
        topo
    }

    #[test]
    fn test_start_all_reaches_every_node() {
        let topo = topology();
        let executor = FakeExecutor::default();
        start_all(&topo, &executor, true).unwrap();

        let commands = executor.commands.lock().unwrap();
        assert!(commands.iter().any(|(t, c)| t == "root@n1" && c == "lxc-start -n a"));
        assert!(commands.iter().any(|(t, c)| t == "root@n2" && c == "lxc-start -n b"));
    }

    #[test]
    fn test_start_all_reports_failed_nodes() {
        let topo = topology();
        let executor = FakeExecutor::failing_on("lxc-start -n b");
        assert!(matches!(
            start_all(&topo, &executor, false),
            Err(ExecError::Nodes { failed: 1, total: 2 })
        ));
    }

    #[test]
    fn test_stop_all_counts_failures() {
        let topo = topology();
        let executor = FakeExecutor::failing_on("lxc-stop");
        assert_eq!(stop_all(&topo, &executor, true).unwrap(), 2);
    }

    #[test]
    fn test_status_all_lists_services() {
        let topo = topology();
        let executor = FakeExecutor::default();
        let states = status_all(&topo, &executor, false);
        let names: Vec<_> = states.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
