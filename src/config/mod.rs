//! Configuration model.
//!
//! Commands, files and instructions are collected into a per-node
//! [`Configuration`] by the [`ConfigurationBuilder`]. Exporters in
//! [`crate::exec`] consume the result.

pub mod command;
pub mod configuration;
pub mod builder;

pub use builder::ConfigurationBuilder;
pub use command::{Command, FileTransfer, Instruction};
pub use configuration::{get_delta, Configuration, ConfigurationDelta};

use crate::network::BindingError;
use crate::topology::TopologyError;

/// Errors raised while building configurations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{operation} does not support instructions")]
    InstructionsNotSupported { operation: &'static str },

    #[error("Controller {controller} is not reachable from switch {switch}")]
    ControllerUnreachable { switch: String, controller: String },

    #[error("Service {service} has no address to use as {purpose}")]
    MissingAddress { service: String, purpose: &'static str },

    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error(transparent)]
    Binding(#[from] BindingError),
}
