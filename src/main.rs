use clap::{Parser, Subcommand};
use color_eyre::eyre::{bail, WrapErr};
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::io::Write;
use std::path::{Path, PathBuf};

use netbed::config::ConfigurationBuilder;
use netbed::exec::{self, ConsoleExporter, FileExporter, SshExecutor};
use netbed::routing::build_routing_table;
use netbed::settings::load_settings;
use netbed::topology::{load_topology, Topology};

/// Network emulation testbed: bring emulated topologies up and down on remote nodes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology document (JSON or YAML)
    #[arg(short, long)]
    topology: PathBuf,

    /// Path to the runner settings YAML file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Log level, overriding the settings file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Print the commands of every node (or of one node)
    Show {
        #[arg(long)]
        node: Option<String>,
    },
    /// Write start.sh / stop.sh scripts per node
    Export {
        /// Output directory, overriding the settings file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Bring the topology up on its nodes
    Start,
    /// Tear the topology down on its nodes
    Stop,
    /// Show the container state of every service
    Status,
    /// Print the routing table of a service
    Routes {
        service: String,
        /// Compute the table the way a switch sees it
        #[arg(long)]
        for_switch: bool,
    },
    /// Check the topology and its bindings without generating anything
    Validate,
}

fn load(path: &Path) -> Result<Topology> {
    let mut topo = load_topology(path).wrap_err_with(|| format!("Failed to load topology '{}'", path.display()))?;
    topo.finalize().wrap_err("Failed to configure the network")?;
    Ok(topo)
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse command-line arguments
    let args = Args::parse();

    let settings = load_settings(args.settings.as_deref()).wrap_err("Failed to load settings")?;
    let level = args.log_level.clone().unwrap_or_else(|| settings.log_level.clone());
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    info!("Topology file: {:?}", args.topology);
    let topo = load(&args.topology)?;
    let executor = SshExecutor::new(settings.ssh.clone());

    match args.command {
        Action::Show { node } => {
            let builder = ConfigurationBuilder::new(&topo)?;
            let stdout = std::io::stdout();
            let mut exporter = ConsoleExporter::new(stdout.lock());
            for (id, config) in builder.build_all()? {
                let name = topo.node(id).name();
                if node.as_deref().map_or(true, |n| n == name) {
                    exporter.export(name, &config)?;
                }
            }
            exporter.into_inner().flush()?;
        }
        Action::Export { output } => {
            let dir = output.unwrap_or_else(|| settings.export_dir.clone());
            let builder = ConfigurationBuilder::new(&topo)?;
            let exporter = FileExporter::new(&dir);
            for (id, config) in builder.build_all()? {
                exporter
                    .export(topo.node(id).name(), &config)
                    .wrap_err_with(|| format!("Failed to export node {}", topo.node(id).name()))?;
            }
            info!("Exported scripts to {:?}", dir);
        }
        Action::Start => {
            exec::start_all(&topo, &executor, settings.parallel).wrap_err("Failed to start the topology")?;
        }
        Action::Stop => {
            let failed = exec::stop_all(&topo, &executor, settings.parallel)?;
            if failed > 0 {
                log::warn!("{} stop commands failed", failed);
            }
        }
        Action::Status => {
            let mut errors = 0;
            for (service, state) in exec::status_all(&topo, &executor, settings.parallel) {
                match state {
                    Ok(state) => println!("{:<20} {}", service, state.trim()),
                    Err(e) => {
                        println!("{:<20} unknown ({})", service, e);
                        errors += 1;
                    }
                }
            }
            if errors > 0 {
                bail!("Could not query {} services", errors);
            }
        }
        Action::Routes { service, for_switch } => {
            let id = topo.service_id(&service)?;
            let table = build_routing_table(&topo, id, for_switch);
            for (ip, route) in table.iter() {
                println!("{:<16} {:<16} {}", ip, topo.interface(route.interface).name(), route.hops);
            }
        }
        Action::Validate => {
            ConfigurationBuilder::new(&topo)?.build_all()?;
            info!(
                "Topology is valid: {} nodes, {} services, {} links",
                topo.nodes().count(),
                topo.services().count(),
                topo.link_count()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["netbed", "--topology", "topo.json", "show", "--node", "n1"]);
        assert_eq!(args.topology, PathBuf::from("topo.json"));
        assert!(matches!(args.command, Action::Show { node: Some(ref n) } if n == "n1"));
    }

    #[test]
    fn test_routes_arguments() {
        let args = Args::parse_from(["netbed", "-t", "topo.yaml", "routes", "s1", "--for-switch"]);
        assert!(matches!(args.command, Action::Routes { ref service, for_switch: true } if service == "s1"));
    }
}
