//! Workspace-rooted tool host backed by the local filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use super::path_safety::validate_path;
use super::process::{ProcessRunner, ShellRunner};
use super::{
    CommandOutput, CommandRequest, DirEntry, PathParams, ToolHost, ToolResult, WriteFileParams,
};
use crate::transport::BoxFuture;

/// Serves tool calls against files under one workspace root.
///
/// Every path, including a command's working directory, is checked with
/// [`validate_path`] before it is touched.
#[derive(Clone)]
pub struct LocalToolHost {
    workspace_root: PathBuf,
    runner: Arc<dyn ProcessRunner>,
}

impl std::fmt::Debug for LocalToolHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalToolHost")
            .field("workspace_root", &self.workspace_root)
            .finish_non_exhaustive()
    }
}

impl LocalToolHost {
    /// Host rooted at `workspace_root` using the platform shell.
    #[must_use]
    pub fn new(workspace_root: PathBuf) -> Self {
        Self::with_runner(workspace_root, Arc::new(ShellRunner::detect()))
    }

    /// Host rooted at `workspace_root` with a custom process runner.
    #[must_use]
    pub fn with_runner(workspace_root: PathBuf, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            workspace_root,
            runner,
        }
    }

    fn resolve(&self, path: &str) -> ToolResult<PathBuf> {
        validate_path(&self.workspace_root, path).map_err(|e| e.to_string())
    }
}

impl ToolHost for LocalToolHost {
    fn write_text_file<'a>(&'a self, params: &'a WriteFileParams) -> BoxFuture<'a, ToolResult<()>> {
        Box::pin(async move {
            let target = self.resolve(&params.path)?;
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
            }
            tokio::fs::write(&target, params.content.as_bytes())
                .await
                .map_err(|e| format!("failed to write {}: {e}", target.display()))?;
            info!(path = %target.display(), bytes = params.content.len(), "tool: file written");
            Ok(())
        })
    }

    fn read_text_file<'a>(&'a self, params: &'a PathParams) -> BoxFuture<'a, ToolResult<String>> {
        Box::pin(async move {
            let target = self.resolve(&params.path)?;
            let content = tokio::fs::read_to_string(&target)
                .await
                .map_err(|e| format!("failed to read {}: {e}", target.display()))?;
            debug!(path = %target.display(), bytes = content.len(), "tool: file read");
            Ok(content)
        })
    }

    fn list_directory<'a>(&'a self, params: &'a PathParams) -> BoxFuture<'a, ToolResult<Vec<DirEntry>>> {
        Box::pin(async move {
            let target = self.resolve(&params.path)?;
            let mut dir = tokio::fs::read_dir(&target)
                .await
                .map_err(|e| format!("failed to list {}: {e}", target.display()))?;

            let mut entries = Vec::new();
            while let Some(entry) = dir
                .next_entry()
                .await
                .map_err(|e| format!("failed to list {}: {e}", target.display()))?
            {
                let is_directory = entry
                    .file_type()
                    .await
                    .map(|t| t.is_dir())
                    .unwrap_or(false);
                entries.push(DirEntry {
                    name: entry.file_name().to_string_lossy().into_owned(),
                    is_directory,
                });
            }
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(entries)
        })
    }

    fn run_command<'a>(&'a self, request: &'a CommandRequest) -> BoxFuture<'a, ToolResult<CommandOutput>> {
        Box::pin(async move {
            let cwd = match &request.cwd {
                Some(cwd) => self.resolve(cwd)?,
                None => self.resolve(".")?,
            };
            let output = self
                .runner
                .run(request, &cwd)
                .await
                .map_err(|e| format!("failed to run {}: {e}", request.command))?;

            let result = CommandOutput {
                id: format!("term-{}", uuid::Uuid::new_v4()),
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            info!(
                terminal_id = result.id.as_str(),
                command = request.command.as_str(),
                exit_code = ?result.exit_code,
                "tool: command finished"
            );
            Ok(result)
        })
    }
}
