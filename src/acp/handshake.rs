//! ACP handshake and session request payloads.
//!
//! The client speaks first and in a fixed order:
//!
//! 1. **`initialize`**: advertises which tool capabilities the client
//!    serves, plus `clientInfo`, the workspace directory and the model.
//!    No other request may precede it.
//! 2. **`session/new`**: sent lazily before the first prompt; the agent
//!    replies with the `sessionId` used for the rest of the conversation.
//! 3. **`session/prompt`**: one per user turn.
//!
//! The functions here only build and read payloads; sending happens in
//! [`crate::orchestrator::engine`].

use std::path::Path;

use serde_json::{json, Value};

use crate::{AppError, Result};

/// Protocol version announced in `initialize`.
pub const PROTOCOL_VERSION: u64 = 1;

/// Handshake method.
pub const METHOD_INITIALIZE: &str = "initialize";
/// Session creation method.
pub const METHOD_SESSION_NEW: &str = "session/new";
/// Prompt submission method.
pub const METHOD_SESSION_PROMPT: &str = "session/prompt";

/// Tool capabilities the client serves to the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ClientCapabilities {
    /// `fs.readTextFile`
    pub read_text_file: bool,
    /// `fs.writeTextFile`
    pub write_text_file: bool,
    /// `fs.listDirectory`
    pub list_directory: bool,
    /// `terminal`
    pub terminal: bool,
}

impl Default for ClientCapabilities {
    fn default() -> Self {
        Self {
            read_text_file: true,
            write_text_file: true,
            list_directory: true,
            terminal: true,
        }
    }
}

impl ClientCapabilities {
    /// Wire shape: `{ fs: { readTextFile, writeTextFile, listDirectory }, terminal }`.
    #[must_use]
    pub fn to_json(self) -> Value {
        json!({
            "fs": {
                "readTextFile": self.read_text_file,
                "writeTextFile": self.write_text_file,
                "listDirectory": self.list_directory,
            },
            "terminal": self.terminal,
        })
    }
}

/// Parameters for the `initialize` request.
#[must_use]
pub fn initialize_params(capabilities: ClientCapabilities, workspace: &Path, model: &str) -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": capabilities.to_json(),
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        },
        "workspaceDirectory": workspace.to_string_lossy(),
        "model": model,
    })
}

/// Parameters for the `session/new` request.
#[must_use]
pub fn new_session_params(workspace: &Path, model: &str) -> Value {
    json!({
        "cwd": workspace.to_string_lossy(),
        "model": model,
        "mcpServers": [],
    })
}

/// Parameters for the `session/prompt` request.
#[must_use]
pub fn prompt_params(session_id: &str, text: &str) -> Value {
    json!({
        "sessionId": session_id,
        "prompt": {
            "role": "user",
            "content": [{ "type": "text", "text": text }],
        },
    })
}

/// Extract the agent-assigned `sessionId` from a `session/new` result.
///
/// # Errors
///
/// Returns `AppError::Acp` if the field is missing, empty, or not a string.
pub fn parse_session_id(result: &Value) -> Result<String> {
    result
        .get("sessionId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| AppError::Acp(format!("session/new result has no sessionId: {result}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
