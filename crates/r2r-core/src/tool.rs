//! Running external packaging and signing tools.
//!
//! Every invocation is bounded by a hard timeout. Input and output go
//! through anonymous temporary files rather than pipes, so neither side can
//! block on a full pipe while we wait on the child.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use thiserror::Error;
use wait_timeout::ChildExt;

/// Captured tail kept in error messages.
const TAIL_LINES: usize = 20;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {secs}s and was killed")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} failed (exit code {code:?})\n--- stdout ---\n{}\n--- stderr ---\n{}", tail(.stdout), tail(.stderr))]
    Failed {
        tool: String,
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
}

/// A tool invocation under construction.
#[derive(Debug)]
pub struct Tool {
    name: String,
    cmd: Command,
    stdin: Option<Vec<u8>>,
    timeout: Duration,
}

impl Tool {
    /// Start describing a run of `program` that must finish within `timeout`.
    pub fn new(program: impl AsRef<OsStr>, timeout: Duration) -> Self {
        let program = program.as_ref();
        Self {
            name: program.to_string_lossy().into_owned(),
            cmd: Command::new(program),
            stdin: None,
            timeout,
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.cmd.args(args);
        self
    }

    /// Set an environment variable for the child only.
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.cmd.env(key, value);
        self
    }

    /// Run in `dir`.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cmd.current_dir(dir);
        self
    }

    /// Feed `data` to the child's stdin.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::Spawn`] if the program cannot be started,
    /// [`ToolError::Timeout`] if it outlives the timeout (it is killed), and
    /// [`ToolError::Failed`] with captured output on a non-zero exit.
    pub fn run(mut self) -> Result<ToolOutput, ToolError> {
        let spawn_err = |source| ToolError::Spawn {
            tool: self.name.clone(),
            source,
        };

        let mut out = tempfile::tempfile().map_err(spawn_err)?;
        let mut err = tempfile::tempfile().map_err(spawn_err)?;

        let input = match self.stdin.take() {
            Some(data) => Stdio::from(stage_input(&data).map_err(spawn_err)?),
            None => Stdio::null(),
        };

        self.cmd
            .stdout(Stdio::from(out.try_clone().map_err(spawn_err)?))
            .stderr(Stdio::from(err.try_clone().map_err(spawn_err)?))
            .stdin(input);

        tracing::debug!(tool = %self.name, cmd = ?self.cmd, "Running tool");
        let mut child = self.cmd.spawn().map_err(spawn_err)?;

        let status = match child.wait_timeout(self.timeout).map_err(spawn_err)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout {
                    tool: self.name,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = read_back(&mut out).map_err(spawn_err)?;
        let stderr = String::from_utf8_lossy(&read_back(&mut err).map_err(spawn_err)?).into_owned();

        if !status.success() {
            return Err(ToolError::Failed {
                tool: self.name,
                code: status.code(),
                stdout: String::from_utf8_lossy(&stdout).into_owned(),
                stderr,
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

/// Write `data` to an unlinked temporary file positioned at its start.
fn stage_input(data: &[u8]) -> std::io::Result<File> {
    let mut file = tempfile::tempfile()?;
    file.write_all(data)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(file)
}

fn read_back(file: &mut File) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    Ok(buf)
}

fn tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(TAIL_LINES);
    lines[start..].join("\n")
}

/// Fail early with a clear message when a required tool is not installed.
///
/// # Errors
///
/// Returns [`ToolError::Spawn`] with `NotFound` when `program` is not on `PATH`.
pub fn require(program: &str) -> Result<(), ToolError> {
    which::which(program)
        .map(|_| ())
        .map_err(|e| ToolError::Spawn {
            tool: program.to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()),
        })
}
