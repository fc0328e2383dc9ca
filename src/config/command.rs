//! Configuration primitives: shell commands, files and instructions.

use std::fmt;
use std::path::PathBuf;

/// A shell command, or a no-op placeholder.
///
/// The placeholder keeps start and stop commands paired when only one
/// direction has a meaningful command. It renders as an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Command(Option<String>);

impl Command {
    /// Wrap a command string. An empty string yields the placeholder.
    pub fn new(command: impl Into<String>) -> Self {
        let command = command.into();
        if command.is_empty() {
            Self(None)
        } else {
            Self(Some(command))
        }
    }

    /// The no-op placeholder.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or("")
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Command {
    fn from(command: String) -> Self {
        Self::new(command)
    }
}

impl From<&str> for Command {
    fn from(command: &str) -> Self {
        Self::new(command)
    }
}

impl From<Option<String>> for Command {
    fn from(command: Option<String>) -> Self {
        command.map(Self::new).unwrap_or_default()
    }
}

/// A local file to be materialized at `destination` on the node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// A step that cannot be expressed as a shell command, shown to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction(String);

impl Instruction {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
