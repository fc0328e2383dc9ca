//! Plain LXC host.

use serde::{Deserialize, Serialize};

use super::container::{self, LxcImage};
use crate::config::Configuration;
use crate::topology::{ServiceId, Topology, TopologyError};

/// A generic container with routes toward everything it can reach.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LxcHost {
    #[serde(flatten)]
    pub image: LxcImage,
}

impl LxcHost {
    pub fn new(image: LxcImage) -> Self {
        Self { image }
    }

    pub(crate) fn append(&self, topology: &Topology, service: ServiceId, config: &mut Configuration) -> Result<(), TopologyError> {
        container::create(config, topology.service(service).name(), &self.image);
        container::interfaces(topology, service, config)?;
        container::routes(topology, service, false, config);
        Ok(())
    }
}
