use std::{
    fs::{File, OpenOptions, read_to_string},
    io::Write,
    path::{Path, PathBuf},
    process::{Child, Command},
};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// A wrapper around processes which allows for their stdout and stderr to be logged to files and
/// flushed when the process is killed or dropped.
#[derive(Debug)]
pub struct Process {
    /// The handle of the child process.
    child: Child,

    /// The file that stdout is being logged to.
    stdout_logs_file: File,

    /// The file that stderr is being logged to.
    stderr_logs_file: File,

    stdout_logs_path: PathBuf,
    stderr_logs_path: PathBuf,
}

impl Process {
    pub fn new(
        log_file_prefix: impl Into<Option<&'static str>>,
        logs_directory: impl AsRef<Path>,
        binary_path: impl AsRef<Path>,
        command_building_callback: impl FnOnce(&mut Command, File, File),
    ) -> Result<Self> {
        let log_file_prefix = log_file_prefix.into();

        let (stdout_file_name, stderr_file_name) = match log_file_prefix {
            Some(prefix) => (
                format!("{prefix}_stdout.log"),
                format!("{prefix}_stderr.log"),
            ),
            None => ("stdout.log".to_string(), "stderr.log".to_string()),
        };

        let stdout_logs_path = logs_directory.as_ref().join(stdout_file_name);
        let stderr_logs_path = logs_directory.as_ref().join(stderr_file_name);

        let stdout_logs_file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(stdout_logs_path.as_path())
            .context("Failed to open the stdout logs file")?;
        let stderr_logs_file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(stderr_logs_path.as_path())
            .context("Failed to open the stderr logs file")?;

        let mut command = {
            let stdout_logs_file = stdout_logs_file
                .try_clone()
                .context("Failed to clone the stdout logs file")?;
            let stderr_logs_file = stderr_logs_file
                .try_clone()
                .context("Failed to clone the stderr logs file")?;

            let mut command = Command::new(binary_path.as_ref());
            command_building_callback(&mut command, stdout_logs_file, stderr_logs_file);
            command
        };
        let child = command.spawn().with_context(|| {
            format!(
                "Failed to spawn the built command: {}",
                binary_path.as_ref().display()
            )
        })?;
        debug!(pid = child.id(), "Spawned process");

        Ok(Self {
            child,
            stdout_logs_file,
            stderr_logs_file,
            stdout_logs_path,
            stderr_logs_path,
        })
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Whether stdout or stderr captured so far contains `marker`.
    pub fn logs_contain(&self, marker: &str) -> Result<bool> {
        let (stdout, stderr) = self.captured_output()?;
        Ok(stdout.contains(marker) || stderr.contains(marker))
    }

    pub fn captured_output(&self) -> Result<(String, String)> {
        let stdout = read_to_string(&self.stdout_logs_path)
            .context("Failed to read the stdout logs file")?;
        let stderr = read_to_string(&self.stderr_logs_path)
            .context("Failed to read the stderr logs file")?;
        Ok((stdout, stderr))
    }

    /// Replays the captured output through the log, one event per line.
    pub fn log_captured_output(&self, name: &str) {
        match self.captured_output() {
            Ok((stdout, stderr)) => {
                for line in stdout.lines() {
                    info!(process = name, stream = "stdout", "{line}");
                }
                for line in stderr.lines() {
                    info!(process = name, stream = "stderr", "{line}");
                }
            }
            Err(error) => debug!(process = name, ?error, "No captured output to replay"),
        }
    }

    /// Kills the process and waits for it so that no zombie is left behind. Killing a process
    /// that already exited is not an error.
    pub fn kill(&mut self) -> Result<()> {
        if self.is_running() {
            self.child.kill().context("Failed to kill the process")?;
        }
        self.child
            .wait()
            .context("Failed to wait for the killed process")?;
        self.stdout_logs_file
            .flush()
            .context("Failed to flush the stdout logs file")?;
        self.stderr_logs_file
            .flush()
            .context("Failed to flush the stderr logs file")?;
        Ok(())
    }
}

impl Drop for Process {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = self.stdout_logs_file.flush();
        let _ = self.stderr_logs_file.flush();
    }
}
