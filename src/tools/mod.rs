//! Client-side tools the agent may invoke.
//!
//! The agent ecosystem has no single spelling for tool methods: the same
//! capability arrives as a bare name (`writeTextFile`), slash-namespaced
//! (`fs/writeTextFile`) or dot-namespaced (`fs.writeTextFile`).
//! [`ToolKind::from_method`] folds every accepted spelling onto one kind,
//! and [`ToolParams::parse`] validates the parameters for that kind
//! before anything is dispatched.
//!
//! Tool execution itself sits behind [`ToolHost`]; [`local::LocalToolHost`]
//! is the workspace-rooted implementation.

pub mod dispatch;
pub mod local;
pub mod path_safety;
pub mod process;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::acp::message::RequestId;
use crate::transport::BoxFuture;
use crate::{AppError, Result};

/// Logical tool kinds served by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    /// Write a text file.
    WriteFile,
    /// Read a text file.
    ReadFile,
    /// List a directory.
    ListDirectory,
    /// Run a command in a terminal.
    RunCommand,
}

/// Accepted method spellings per tool kind.
const METHOD_ALIASES: &[(ToolKind, &[&str])] = &[
    (
        ToolKind::WriteFile,
        &["writeTextFile", "fs/writeTextFile", "fs.writeTextFile"],
    ),
    (
        ToolKind::ReadFile,
        &["readTextFile", "fs/readTextFile", "fs.readTextFile"],
    ),
    (
        ToolKind::ListDirectory,
        &["listDirectory", "fs/listDirectory", "fs.listDirectory"],
    ),
    (
        ToolKind::RunCommand,
        &[
            "createTerminal",
            "terminal/create",
            "terminal.create",
            "fs/createTerminal",
            "fs.createTerminal",
        ],
    ),
];

impl ToolKind {
    /// Resolve a method name to its tool kind; `None` for anything else.
    #[must_use]
    pub fn from_method(method: &str) -> Option<Self> {
        METHOD_ALIASES
            .iter()
            .find(|(_, names)| names.contains(&method))
            .map(|(kind, _)| *kind)
    }

    /// All method spellings routed to this kind.
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        METHOD_ALIASES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|&(_, names)| names)
            .unwrap_or_default()
    }

    /// Stable snake_case name used in logs and the audit trail.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WriteFile => "write_file",
            Self::ReadFile => "read_file",
            Self::ListDirectory => "list_directory",
            Self::RunCommand => "run_command",
        }
    }
}

impl Display for ToolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for a file write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteFileParams {
    /// Target path, absolute or workspace-relative.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// Parameters for a file read or directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathParams {
    /// Target path, absolute or workspace-relative.
    pub path: String,
}

/// Parameters for a command run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Program, or a full shell command line when `args` is empty.
    pub command: String,
    /// Arguments passed directly to `command`, bypassing the shell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Working directory, absolute or workspace-relative.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
}

/// Validated parameters, one variant per tool kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolParams {
    /// [`ToolKind::WriteFile`]
    WriteFile(WriteFileParams),
    /// [`ToolKind::ReadFile`]
    ReadFile(PathParams),
    /// [`ToolKind::ListDirectory`]
    ListDirectory(PathParams),
    /// [`ToolKind::RunCommand`]
    RunCommand(CommandRequest),
}

impl ToolParams {
    /// Validate raw JSON parameters against the shape `kind` requires.
    ///
    /// Extra fields (such as `sessionId`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Acp` if a required field is missing or has the
    /// wrong type.
    pub fn parse(kind: ToolKind, raw: Value) -> Result<Self> {
        let invalid = |e: serde_json::Error| AppError::Acp(format!("invalid {kind} params: {e}"));
        match kind {
            ToolKind::WriteFile => serde_json::from_value(raw).map(Self::WriteFile),
            ToolKind::ReadFile => serde_json::from_value(raw).map(Self::ReadFile),
            ToolKind::ListDirectory => serde_json::from_value(raw).map(Self::ListDirectory),
            ToolKind::RunCommand => serde_json::from_value(raw).map(Self::RunCommand),
        }
        .map_err(invalid)
    }

    /// Kind these parameters belong to.
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        match self {
            Self::WriteFile(_) => ToolKind::WriteFile,
            Self::ReadFile(_) => ToolKind::ReadFile,
            Self::ListDirectory(_) => ToolKind::ListDirectory,
            Self::RunCommand(_) => ToolKind::RunCommand,
        }
    }

    /// Normalised JSON form for display and auditing.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let value = match self {
            Self::WriteFile(p) => serde_json::to_value(p),
            Self::ReadFile(p) | Self::ListDirectory(p) => serde_json::to_value(p),
            Self::RunCommand(p) => serde_json::to_value(p),
        };
        value.unwrap_or(Value::Null)
    }
}

/// One agent tool call, from receipt until its single response is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Peer request identifier, echoed in the response.
    pub request_id: RequestId,
    /// Validated parameters.
    pub params: ToolParams,
}

impl ToolInvocation {
    /// Tool kind of this invocation.
    #[must_use]
    pub fn kind(&self) -> ToolKind {
        self.params.kind()
    }
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirEntry {
    /// File name, without the parent path.
    pub name: String,
    /// `true` for directories.
    pub is_directory: bool,
}

/// Captured result of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    /// Opaque terminal identifier.
    pub id: String,
    /// Exit status; `None` if the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// Collaborator outcome: a payload or an error message.
///
/// A panicking collaborator is reported by the dispatcher as a failure.
pub type ToolResult<T> = std::result::Result<T, String>;

/// External tool implementations used by the dispatcher.
pub trait ToolHost: Send + Sync {
    /// Write `content` to `path`, replacing any existing file.
    fn write_text_file<'a>(&'a self, params: &'a WriteFileParams) -> BoxFuture<'a, ToolResult<()>>;

    /// Read `path` as UTF-8 text.
    fn read_text_file<'a>(&'a self, params: &'a PathParams) -> BoxFuture<'a, ToolResult<String>>;

    /// List the entries of `path`.
    fn list_directory<'a>(&'a self, params: &'a PathParams) -> BoxFuture<'a, ToolResult<Vec<DirEntry>>>;

    /// Run a command to completion.
    fn run_command<'a>(&'a self, request: &'a CommandRequest) -> BoxFuture<'a, ToolResult<CommandOutput>>;
}

/// Execute `params` on `host` and shape the success payload per kind.
///
/// | Kind          | Result                                     |
/// |---------------|--------------------------------------------|
/// | write file    | `{}`                                       |
/// | read file     | `{content}`                                |
/// | list directory| `{entries:[{name,isDirectory}]}`           |
/// | run command   | `{id, exitCode, stdout, stderr}`           |
pub async fn execute(host: &dyn ToolHost, params: &ToolParams) -> ToolResult<Value> {
    match params {
        ToolParams::WriteFile(p) => host.write_text_file(p).await.map(|()| json!({})),
        ToolParams::ReadFile(p) => host
            .read_text_file(p)
            .await
            .map(|content| json!({ "content": content })),
        ToolParams::ListDirectory(p) => host
            .list_directory(p)
            .await
            .map(|entries| json!({ "entries": entries })),
        ToolParams::RunCommand(p) => host
            .run_command(p)
            .await
            .and_then(|out| serde_json::to_value(out).map_err(|e| e.to_string())),
    }
}
