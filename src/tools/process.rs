//! Command execution for the `run_command` tool.
//!
//! [`ProcessRunner`] is the seam between the tool host and the operating
//! system. [`ShellRunner`] runs a bare command line through the platform
//! shell and runs a command with explicit `args` directly, without a shell.

use std::path::Path;
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::debug;

use super::CommandRequest;
use crate::transport::BoxFuture;

/// Runs one command to completion and captures its output.
pub trait ProcessRunner: Send + Sync {
    /// Run `request` in `cwd`, waiting for exit.
    fn run<'a>(
        &'a self,
        request: &'a CommandRequest,
        cwd: &'a Path,
    ) -> BoxFuture<'a, std::io::Result<Output>>;
}

/// Platform shell runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellRunner {
    shell: String,
    flag: String,
}

impl ShellRunner {
    /// Runner for the current platform: `cmd /C` on Windows, `sh -c` elsewhere.
    #[must_use]
    pub fn detect() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }

    /// Runner using `shell flag <command line>`.
    #[must_use]
    pub fn new(shell: impl Into<String>, flag: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            flag: flag.into(),
        }
    }

    fn command_for(&self, request: &CommandRequest) -> Command {
        if request.args.is_empty() {
            let mut cmd = Command::new(&self.shell);
            cmd.arg(&self.flag).arg(&request.command);
            cmd
        } else {
            let mut cmd = Command::new(&request.command);
            cmd.args(&request.args);
            cmd
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::detect()
    }
}

impl ProcessRunner for ShellRunner {
    fn run<'a>(
        &'a self,
        request: &'a CommandRequest,
        cwd: &'a Path,
    ) -> BoxFuture<'a, std::io::Result<Output>> {
        Box::pin(async move {
            let mut cmd = self.command_for(request);
            cmd.current_dir(cwd)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            debug!(command = request.command.as_str(), cwd = %cwd.display(), "tool: running command");
            cmd.output().await
        })
    }
}
