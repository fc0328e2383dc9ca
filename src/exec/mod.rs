//! Remote execution.
//!
//! Configurations are handed to an exporter: [`ConsoleExporter`] prints
//! them, [`FileExporter`] writes `start.sh`/`stop.sh` scripts and
//! [`LiveExporter`] runs them on the nodes through a [`RemoteExecutor`].
//! Stop commands always run in reverse order of their start commands.

pub mod exporter;
pub mod parallel;
pub mod ssh;

pub use exporter::{ConsoleExporter, FileExporter, LiveExporter};
pub use parallel::{start_all, status_all, stop_all};
pub use ssh::SshExecutor;

use std::path::{Path, PathBuf};

use crate::config::ConfigError;
use crate::topology::{Node, TopologyError};

/// Errors raised while exporting or executing configurations
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Non-zero exit code of command {command} on {target}: {code}")]
    CommandFailed { target: String, command: String, code: i32 },

    #[error("{exporter} cannot carry instructions")]
    InstructionsNotSupported { exporter: &'static str },

    #[error("{failed} of {total} nodes failed")]
    Nodes { failed: usize, total: usize },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Topology(#[from] TopologyError),
}

impl ExecError {
    /// Exit code if a remote command failed.
    pub fn status(&self) -> Option<i32> {
        if let ExecError::CommandFailed { code, .. } = self {
            Some(*code)
        } else {
            None
        }
    }
}

/// Where and how a node is reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub address: String,
    pub port: u16,
    pub work_dir: PathBuf,
}

impl RemoteTarget {
    pub fn from_node(node: &Node) -> Self {
        let access = node.access();
        Self {
            address: access.ssh_remote.clone(),
            port: access.ssh_port,
            work_dir: PathBuf::from(&access.ssh_work_dir),
        }
    }

    /// Relative destinations are placed in the work directory.
    pub fn resolve(&self, destination: &Path) -> PathBuf {
        if destination.is_absolute() {
            destination.to_path_buf()
        } else {
            self.work_dir.join(destination)
        }
    }
}

/// Receives the output of a remote command line by line.
pub trait OutputConsumer {
    fn consume(&mut self, line: &str);
}

impl OutputConsumer for Vec<String> {
    fn consume(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// Forwards output lines to the log.
#[derive(Debug, Clone)]
pub struct LogConsumer {
    pub prefix: String,
}

impl OutputConsumer for LogConsumer {
    fn consume(&mut self, line: &str) {
        log::debug!("[{}] {}", self.prefix, line);
    }
}

/// Runs commands and copies files on remote targets.
pub trait RemoteExecutor: Sync {
    /// Run `command` on `target`, streaming its output to `consumers`, and
    /// return its exit code.
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &str,
        consumers: &mut [&mut dyn OutputConsumer],
    ) -> Result<i32, ExecError>;

    /// Copy a local file or directory to `destination` on `target`.
    fn transfer(&self, target: &RemoteTarget, source: &Path, destination: &Path) -> Result<(), ExecError>;
}
