//! Command execution over SSH.
//!
//! Every invocation shares a control master, so only the first command to a
//! node pays for the connection setup:
//!
//! - `ControlMaster auto`
//! - `ControlPath /tmp/.ssh-%r@%h:%p`
//! - `ControlPersist` from the settings
//! - `BatchMode yes` unless disabled
//!
//! Make sure the nodes accept key-based logins; there is no password prompt.

use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};

use super::{ExecError, OutputConsumer, RemoteExecutor, RemoteTarget};
use crate::settings::SshSettings;

const CONTROL_PATH: &str = "/tmp/.ssh-%r@%h:%p";

/// Runs commands through the `ssh` and `scp` binaries.
#[derive(Debug, Clone, Default)]
pub struct SshExecutor {
    settings: SshSettings,
}

impl SshExecutor {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Options shared by `ssh` and `scp`.
    fn common_options(&self) -> Vec<String> {
        let mut options = vec![
            "-oControlMaster=auto".to_string(),
            format!("-oControlPath={}", CONTROL_PATH),
            format!("-oControlPersist={}s", self.settings.control_persist.as_secs()),
            format!("-oConnectTimeout={}", self.settings.connect_timeout.as_secs().max(1)),
        ];
        if self.settings.batch_mode {
            options.push("-oBatchMode=yes".to_string());
        }
        if let Some(identity) = &self.settings.identity_file {
            options.push("-i".to_string());
            options.push(identity.display().to_string());
        }
        options
    }

    /// The `ssh` invocation running `command` on `target`.
    pub fn ssh_command(&self, target: &RemoteTarget, command: &str) -> Command {
        let mut cmd = Command::new(&self.settings.binary);
        cmd.args(self.common_options())
            .arg("-p")
            .arg(target.port.to_string())
            .arg(&target.address)
            .arg(command);
        cmd
    }

    /// The `scp` invocation copying `source` to `destination` on `target`.
    pub fn scp_command(&self, target: &RemoteTarget, source: &Path, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.scp_binary);
        cmd.args(self.common_options())
            .arg("-r")
            .arg("-P")
            .arg(target.port.to_string())
            .arg(source)
            .arg(format!("{}:{}", target.address, target.resolve(destination).display()));
        cmd
    }
}

impl RemoteExecutor for SshExecutor {
    fn execute(
        &self,
        target: &RemoteTarget,
        command: &str,
        consumers: &mut [&mut dyn OutputConsumer],
    ) -> Result<i32, ExecError> {
        log::trace!("[{}] `{}`", target.address, command);
        let mut child = self
            .ssh_command(target, command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: self.settings.binary.clone(),
                source,
            })?;

        // stderr is drained on its own thread while stdout streams.
        let stderr = child.stderr.take().map(|mut pipe| {
            std::thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = pipe.read_to_end(&mut buffer);
                String::from_utf8_lossy(&buffer).into_owned()
            })
        });

        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(BufReader::new(stdout), consumers),
            None => Ok(()),
        };
        if streamed.is_err() {
            // The child may be blocked on a full pipe nobody reads any more.
            let _ = child.kill();
        }

        // Reap the child and the stderr thread before reporting anything.
        let status = child.wait();
        let stderr = stderr.and_then(|handle| handle.join().ok());

        streamed.map_err(|source| ExecError::Io {
            path: format!("{}:stdout", target.address),
            source,
        })?;
        let status = status.map_err(|source| ExecError::Spawn {
            program: self.settings.binary.clone(),
            source,
        })?;
        let code = status.code().unwrap_or(-1);
        if let Some(stderr) = stderr {
            if code != 0 && !stderr.is_empty() {
                log::debug!("[{}] `{}` exited with {}\nSTDERR:\n{}", target.address, command, code, stderr);
            }
        }
        Ok(code)
    }

    fn transfer(&self, target: &RemoteTarget, source: &Path, destination: &Path) -> Result<(), ExecError> {
        log::trace!("[{}] scp {:?} {:?}", target.address, source, destination);
        let output = self
            .scp_command(target, source, destination)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: self.settings.scp_binary.clone(),
                source,
            })?;
        if output.status.success() {
            Ok(())
        } else {
            let code = output.status.code().unwrap_or(-1);
            log::error!(
                "[{}] scp {:?} failed with exit code {}\nSTDERR:\n{}",
                target.address,
                source,
                code,
                String::from_utf8_lossy(&output.stderr)
            );
            Err(ExecError::CommandFailed {
                target: target.address.clone(),
                command: format!("scp {}", source.display()),
                code,
            })
        }
    }
}

/// Feed every line of `reader` to `consumers`. Bytes that are not valid
/// UTF-8 are replaced rather than aborting the stream.
fn stream_lines<R: BufRead>(mut reader: R, consumers: &mut [&mut dyn OutputConsumer]) -> io::Result<()> {
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer)? == 0 {
            return Ok(());
        }
        if buffer.last() == Some(&b'\n') {
            buffer.pop();
            if buffer.last() == Some(&b'\r') {
                buffer.pop();
            }
        }
        let line = String::from_utf8_lossy(&buffer);
        for consumer in consumers.iter_mut() {
            consumer.consume(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn target() -> RemoteTarget {
        RemoteTarget {
            address: "root@n1".to_string(),
            port: 2222,
            work_dir: PathBuf::from("/tmp/netbed"),
        }
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args().map(|a| a.to_string_lossy().to_string()).collect()
    }

    #[test]
    fn test_ssh_arguments() {
        let executor = SshExecutor::new(SshSettings {
            identity_file: Some(PathBuf::from("/root/.ssh/lab")),
            control_persist: Duration::from_secs(600),
            ..Default::default()
        });
        let cmd = executor.ssh_command(&target(), "ip link show");
        let args = args(&cmd);
        assert_eq!(cmd.get_program(), "ssh");
        assert!(args.contains(&"-oControlMaster=auto".to_string()));
        assert!(args.contains(&"-oControlPersist=600s".to_string()));
        assert!(args.contains(&"-oBatchMode=yes".to_string()));
        assert!(args.contains(&"/root/.ssh/lab".to_string()));
        assert_eq!(&args[args.len() - 4..], ["-p", "2222", "root@n1", "ip link show"]);
    }

    #[test]
    fn test_output_with_invalid_utf8_keeps_streaming() {
        let output: &[u8] = b"RUNNING\r\nname: \xff\xfe\nlast line";
        let mut lines: Vec<String> = Vec::new();
        let consumer: &mut dyn OutputConsumer = &mut lines;
        stream_lines(output, &mut [consumer]).unwrap();
        assert_eq!(lines, vec!["RUNNING", "name: \u{fffd}\u{fffd}", "last line"]);
    }

    #[test]
    fn test_read_error_is_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }
        let mut lines: Vec<String> = Vec::new();
        let consumer: &mut dyn OutputConsumer = &mut lines;
        let err = stream_lines(BufReader::new(Broken), &mut [consumer]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_scp_resolves_relative_destination() {
        let executor = SshExecutor::default();
        let cmd = executor.scp_command(&target(), Path::new("keys/id.pub"), Path::new("a/id.pub"));
        let args = args(&cmd);
        assert_eq!(args.last().map(String::as_str), Some("root@n1:/tmp/netbed/a/id.pub"));
        assert!(args.contains(&"-P".to_string()));
    }
}
