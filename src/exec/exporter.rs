//! Configuration exporters.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{ExecError, LogConsumer, OutputConsumer, RemoteExecutor, RemoteTarget};
use crate::config::Configuration;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExecError + '_ {
    move |source| ExecError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Prints configurations in a readable form, instructions included.
#[derive(Debug)]
pub struct ConsoleExporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleExporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn export(&mut self, node: &str, config: &Configuration) -> Result<(), ExecError> {
        let console = PathBuf::from("<console>");
        self.write(node, config).map_err(io_error(&console))
    }

    fn write(&mut self, node: &str, config: &Configuration) -> std::io::Result<()> {
        writeln!(self.out, "=== {} ===", node)?;
        if !config.files().is_empty() {
            writeln!(self.out, "# files")?;
            for (service, files) in config.files() {
                for file in files {
                    writeln!(
                        self.out,
                        "{}: {} -> {}",
                        service,
                        file.source.display(),
                        file.destination.display()
                    )?;
                }
            }
        }
        writeln!(self.out, "# start")?;
        for cmd in config.start_cmds().iter().filter(|c| !c.is_none()) {
            writeln!(self.out, "{}", cmd)?;
        }
        for instruction in config.start_instructions() {
            writeln!(self.out, "> {}", instruction)?;
        }
        writeln!(self.out, "# stop")?;
        for instruction in config.stop_instructions() {
            writeln!(self.out, "> {}", instruction)?;
        }
        for cmd in config.teardown_cmds().filter(|c| !c.is_none()) {
            writeln!(self.out, "{}", cmd)?;
        }
        Ok(())
    }
}

/// Writes `<dir>/<node>/start.sh`, `stop.sh` and `files.txt`.
#[derive(Debug, Clone)]
pub struct FileExporter {
    dir: PathBuf,
}

impl FileExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Export one node's configuration and return its directory.
    pub fn export(&self, node: &str, config: &Configuration) -> Result<PathBuf, ExecError> {
        if config.has_instructions() {
            return Err(ExecError::InstructionsNotSupported { exporter: "file export" });
        }
        let dir = self.dir.join(node);
        fs::create_dir_all(&dir).map_err(io_error(&dir))?;

        let mut start = String::from("#!/bin/sh\nset -e\n");
        for cmd in config.start_cmds().iter().filter(|c| !c.is_none()) {
            start.push_str(cmd.as_str());
            start.push('\n');
        }
        // No `set -e` on teardown: every stop command gets its chance.
        let mut stop = String::from("#!/bin/sh\n");
        for cmd in config.teardown_cmds().filter(|c| !c.is_none()) {
            stop.push_str(cmd.as_str());
            stop.push('\n');
        }
        write_script(&dir.join("start.sh"), &start)?;
        write_script(&dir.join("stop.sh"), &stop)?;

        let mut listing = String::new();
        for (service, files) in config.files() {
            for file in files {
                listing.push_str(&format!(
                    "{}\t{}\t{}\n",
                    service,
                    file.source.display(),
                    file.destination.display()
                ));
            }
        }
        let files = dir.join("files.txt");
        fs::write(&files, listing).map_err(io_error(&files))?;

        log::info!("Exported {} command pairs for {} to {:?}", config.len(), node, dir);
        Ok(dir)
    }
}

fn write_script(path: &Path, content: &str) -> Result<(), ExecError> {
    fs::write(path, content).map_err(io_error(path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path).map_err(io_error(path))?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms).map_err(io_error(path))?;
    }
    Ok(())
}

/// Runs configurations on their nodes.
#[derive(Debug)]
pub struct LiveExporter<'a, E: RemoteExecutor> {
    executor: &'a E,
}

impl<'a, E: RemoteExecutor> LiveExporter<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Push files, then run start commands in order. The first failing
    /// command aborts the start.
    pub fn start(&self, target: &RemoteTarget, config: &Configuration) -> Result<(), ExecError> {
        if config.has_instructions() {
            return Err(ExecError::InstructionsNotSupported { exporter: "live export" });
        }
        for files in config.files().values() {
            for file in files {
                self.executor.transfer(target, &file.source, &file.destination)?;
            }
        }
        let mut log = LogConsumer {
            prefix: target.address.clone(),
        };
        for cmd in config.start_cmds().iter().filter(|c| !c.is_none()) {
            let code = self.run(target, cmd.as_str(), &mut log)?;
            if code != 0 {
                log::error!("[{}] `{}` exited with exit code {}", target.address, cmd, code);
                return Err(ExecError::CommandFailed {
                    target: target.address.clone(),
                    command: cmd.to_string(),
                    code,
                });
            }
        }
        log::info!("[{}] started {} commands", target.address, config.len());
        Ok(())
    }

    /// Run every stop command in reverse order. Failures are logged and
    /// counted, never fatal; the number of failed commands is returned.
    pub fn stop(&self, target: &RemoteTarget, config: &Configuration) -> Result<usize, ExecError> {
        if config.has_instructions() {
            return Err(ExecError::InstructionsNotSupported { exporter: "live export" });
        }
        let mut log = LogConsumer {
            prefix: target.address.clone(),
        };
        let mut failed = 0;
        for cmd in config.teardown_cmds().filter(|c| !c.is_none()) {
            match self.run(target, cmd.as_str(), &mut log) {
                Ok(0) => {}
                Ok(code) => {
                    log::warn!("[{}] `{}` exited with exit code {}", target.address, cmd, code);
                    failed += 1;
                }
                Err(e) => {
                    log::warn!("[{}] `{}` failed: {}", target.address, cmd, e);
                    failed += 1;
                }
            }
        }
        log::info!("[{}] stopped, {} commands failed", target.address, failed);
        Ok(failed)
    }

    fn run(&self, target: &RemoteTarget, command: &str, log: &mut LogConsumer) -> Result<i32, ExecError> {
        let consumer: &mut dyn OutputConsumer = log;
        self.executor.execute(target, command, &mut [consumer])
    }

    /// Run `command` on `target` and return its output.
    pub fn query(&self, target: &RemoteTarget, command: &str) -> Result<String, ExecError> {
        let mut lines: Vec<String> = Vec::new();
        let code = {
            let consumer: &mut dyn OutputConsumer = &mut lines;
            self.executor.execute(target, command, &mut [consumer])?
        };
        if code != 0 {
            return Err(ExecError::CommandFailed {
                target: target.address.clone(),
                command: command.to_string(),
                code,
            });
        }
        Ok(lines.join("\n"))
    }

    /// State of the container running `service`.
    pub fn status(&self, target: &RemoteTarget, service: &str) -> Result<String, ExecError> {
        self.query(target, &crate::services::status_command(service))
    }
}
