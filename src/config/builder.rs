//! Configuration builder.
//!
//! Turns a finalized topology into per-node configurations: network commands
//! from the strategy first, then every hosted service in registration order.

use super::configuration::Configuration;
use super::ConfigError;
use crate::services;
use crate::topology::{NodeId, ServiceId, Topology};

/// Builds configurations from a finalized topology.
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationBuilder<'a> {
    topology: &'a Topology,
}

impl<'a> ConfigurationBuilder<'a> {
    /// Fails when the topology has not been finalized.
    pub fn new(topology: &'a Topology) -> Result<Self, ConfigError> {
        topology.allocations()?;
        Ok(Self { topology })
    }

    /// Full configuration of `node`: network setup, then hosted services.
    pub fn build(&self, node: NodeId) -> Result<Configuration, ConfigError> {
        let mut config = self.build_base(node)?;
        for (service, _) in self.topology.services_on(node) {
            services::append_to_configuration(self.topology, service, &mut config)?;
        }
        log::info!(
            "Built configuration for node {}: {} command pairs, {} services with files",
            self.topology.node(node).name(),
            config.len(),
            config.files().len()
        );
        Ok(config)
    }

    /// Network-only configuration of `node`.
    pub fn build_base(&self, node: NodeId) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::new();
        self.topology.network().generate(self.topology, node, &mut config)?;
        Ok(config)
    }

    /// Configuration of a single service, without the network setup.
    pub fn build_service(&self, service: ServiceId) -> Result<Configuration, ConfigError> {
        let mut config = Configuration::new();
        services::append_to_configuration(self.topology, service, &mut config)?;
        Ok(config)
    }

    /// Configurations of every node, in registration order.
    pub fn build_all(&self) -> Result<Vec<(NodeId, Configuration)>, ConfigError> {
        self.topology
            .nodes()
            .map(|(id, _)| self.build(id).map(|config| (id, config)))
            .collect()
    }
}
