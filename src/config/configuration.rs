//! Per-node configurations and the delta between two of them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::command::{Command, FileTransfer, Instruction};
use super::ConfigError;

/// Ordered start/stop commands, files and instructions for one node.
///
/// Start and stop commands are only ever appended as a pair, so index `i` of
/// `stop_cmds` undoes index `i` of `start_cmds`. Teardown replays the stop
/// commands from last to first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    start_cmds: Vec<Command>,
    stop_cmds: Vec<Command>,
    files: BTreeMap<String, Vec<FileTransfer>>,
    start_instructions: Vec<Instruction>,
    stop_instructions: Vec<Instruction>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a matched start/stop pair.
    pub fn add_command(&mut self, start: impl Into<Command>, stop: impl Into<Command>) {
        self.start_cmds.push(start.into());
        self.stop_cmds.push(stop.into());
    }

    /// Materialize `source` at `destination` for `service` on export.
    pub fn add_file(&mut self, service: &str, source: impl Into<PathBuf>, destination: impl Into<PathBuf>) {
        self.files.entry(service.to_string()).or_default().push(FileTransfer {
            source: source.into(),
            destination: destination.into(),
        });
    }

    pub fn add_start_instruction(&mut self, instruction: impl Into<String>) {
        self.start_instructions.push(Instruction::new(instruction));
    }

    pub fn add_stop_instruction(&mut self, instruction: impl Into<String>) {
        self.stop_instructions.push(Instruction::new(instruction));
    }

    /// Append everything from `other` after the current content.
    pub fn extend(&mut self, other: Configuration) {
        self.start_cmds.extend(other.start_cmds);
        self.stop_cmds.extend(other.stop_cmds);
        for (service, files) in other.files {
            self.files.entry(service).or_default().extend(files);
        }
        self.start_instructions.extend(other.start_instructions);
        self.stop_instructions.extend(other.stop_instructions);
    }

    pub fn start_cmds(&self) -> &[Command] {
        &self.start_cmds
    }

    pub fn stop_cmds(&self) -> &[Command] {
        &self.stop_cmds
    }

    /// Stop commands in teardown order (last started, first stopped).
    pub fn teardown_cmds(&self) -> impl Iterator<Item = &Command> {
        self.stop_cmds.iter().rev()
    }

    pub fn files(&self) -> &BTreeMap<String, Vec<FileTransfer>> {
        &self.files
    }

    pub fn start_instructions(&self) -> &[Instruction] {
        &self.start_instructions
    }

    pub fn stop_instructions(&self) -> &[Instruction] {
        &self.stop_instructions
    }

    pub fn has_instructions(&self) -> bool {
        !self.start_instructions.is_empty() || !self.stop_instructions.is_empty()
    }

    /// Number of command pairs.
    pub fn len(&self) -> usize {
        self.start_cmds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_cmds.is_empty() && self.files.is_empty() && !self.has_instructions()
    }
}

/// Patch turning a running `destroy` configuration into `create`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationDelta {
    stop_cmds: Vec<Command>,
    files: BTreeMap<String, Vec<FileTransfer>>,
    start_cmds: Vec<Command>,
}

impl ConfigurationDelta {
    /// Stop commands to run, in the order they appear in `destroy`.
    pub fn stop_cmds(&self) -> &[Command] {
        &self.stop_cmds
    }

    /// Stop commands in the order they are applied, last one first.
    pub fn teardown_cmds(&self) -> impl Iterator<Item = &Command> {
        self.stop_cmds.iter().rev()
    }

    pub fn files(&self) -> &BTreeMap<String, Vec<FileTransfer>> {
        &self.files
    }

    pub fn start_cmds(&self) -> &[Command] {
        &self.start_cmds
    }

    /// True when no command needs to run.
    pub fn is_noop(&self) -> bool {
        self.stop_cmds.is_empty() && self.start_cmds.is_empty()
    }
}

/// Compute the minimal patch replacing `destroy` by `create`.
///
/// Stop commands only `destroy` has tear down what goes away, start commands
/// only `create` has bring up what is new, and all of `create`'s files are
/// reapplied. No-op placeholders never appear in the patch.
pub fn get_delta(destroy: &Configuration, create: &Configuration) -> Result<ConfigurationDelta, ConfigError> {
    if destroy.has_instructions() || create.has_instructions() {
        return Err(ConfigError::InstructionsNotSupported { operation: "delta computation" });
    }

    let stop_cmds = destroy
        .stop_cmds
        .iter()
        .filter(|cmd| !cmd.is_none() && !create.stop_cmds.contains(cmd))
        .cloned()
        .collect();
    let start_cmds = create
        .start_cmds
        .iter()
        .filter(|cmd| !cmd.is_none() && !destroy.start_cmds.contains(cmd))
        .cloned()
        .collect();

    Ok(ConfigurationDelta {
        stop_cmds,
        files: create.files.clone(),
        start_cmds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(cmds: &[Command]) -> Vec<&str> {
        cmds.iter().map(Command::as_str).collect()
    }

    #[test]
    fn test_commands_stay_paired() {
        let mut config = Configuration::new();
        config.add_command("ip link add nb1 type bridge", "ip link del nb1");
        config.add_command("tc qdisc add dev nv1 parent 1: handle 2: tbf", Command::none());
        assert_eq!(config.start_cmds().len(), config.stop_cmds().len());
        assert_eq!(config.len(), 2);
        assert_eq!(config.stop_cmds()[1].as_str(), "");
    }

    #[test]
    fn test_teardown_is_reversed() {
        let mut config = Configuration::new();
        config.add_command("a", "undo a");
        config.add_command("b", "undo b");
        config.add_command("c", "undo c");
        let order: Vec<&str> = config.teardown_cmds().map(Command::as_str).collect();
        assert_eq!(order, vec!["undo c", "undo b", "undo a"]);
    }

    #[test]
    fn test_files_accumulate_per_service() {
        let mut config = Configuration::new();
        config.add_file("h1", "/tmp/a", "/etc/a");
        config.add_file("h1", "/tmp/b", "/etc/b");
        config.add_file("h2", "/tmp/c", "/etc/c");
        assert_eq!(config.files()["h1"].len(), 2);
        assert_eq!(config.files()["h2"][0].destination, PathBuf::from("/etc/c"));
    }

    #[test]
    fn test_extend_keeps_order() {
        let mut base = Configuration::new();
        base.add_command("a", "undo a");
        base.add_file("h1", "/tmp/a", "/etc/a");
        let mut other = Configuration::new();
        other.add_command("b", "undo b");
        other.add_file("h1", "/tmp/b", "/etc/b");
        other.add_start_instruction("press any key");
        base.extend(other);
        assert_eq!(commands(base.start_cmds()), vec!["a", "b"]);
        assert_eq!(base.files()["h1"].len(), 2);
        assert!(base.has_instructions());
    }

    #[test]
    fn test_delta_of_identical_configurations() {
        let mut config = Configuration::new();
        config.add_command("a", "undo a");
        config.add_command("b", Command::none());
        config.add_file("h1", "/tmp/a", "/etc/a");

        let delta = get_delta(&config, &config).unwrap();
        assert!(delta.is_noop());
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
        assert_eq!(commands(delta.stop_cmds()), vec!["A"]);
        assert_eq!(commands(delta.start_cmds()), vec!["Z"]);
        assert_eq!(delta.files(), create.files());
    }

    #[test]
    fn test_delta_teardown_is_reversed() {
        let mut destroy = Configuration::new();
        destroy.add_command("up a", "down a");
        destroy.add_command("up b", "down b");
        destroy.add_command("up c", "down c");
        let delta = get_delta(&destroy, &Configuration::new()).unwrap();
        assert_eq!(commands(delta.stop_cmds()), vec!["down a", "down b", "down c"]);
        let order: Vec<&str> = delta.teardown_cmds().map(Command::as_str).collect();
        assert_eq!(order, vec!["down c", "down b", "down a"]);
    }

    #[test]
    fn test_delta_rejects_instructions() {
        let plain = Configuration::new();
        let mut with_instructions = Configuration::new();
        with_instructions.add_stop_instruction("unplug the cable");
        assert!(matches!(
            get_delta(&with_instructions, &plain),
            Err(ConfigError::InstructionsNotSupported { .. })
        ));
        assert!(matches!(
            get_delta(&plain, &with_instructions),
            Err(ConfigError::InstructionsNotSupported { .. })
        ));
    }
}
