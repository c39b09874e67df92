//! Session model and replay history.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a history entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    /// User prompt delivered to the agent.
    Prompt,
    /// Tool call received from the agent.
    ToolCall,
    /// Successful tool result delivered to the agent.
    ToolResult,
}

/// One append-only entry in the session's replay log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Entry kind.
    #[serde(rename = "type")]
    pub kind: HistoryKind,
    /// Kind-specific payload.
    #[serde(rename = "data")]
    pub payload: Value,
    /// Time the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Construct an entry stamped with the current time.
    #[must_use]
    pub fn new(kind: HistoryKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// Conversation state persisted per agent-assigned session id.
///
/// Serialises to the persisted record shape
/// `{sessionId, model, workspaceDir, timestamp, history}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    /// Identifier assigned by the agent in `session/new`.
    #[serde(rename = "sessionId")]
    pub id: String,
    /// Model the session was created with.
    pub model: String,
    /// Workspace the session operated in.
    #[serde(rename = "workspaceDir")]
    pub workspace_root: PathBuf,
    /// Creation time.
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Ordered replay log.
    pub history: Vec<HistoryEntry>,
}

impl Session {
    /// Construct an empty session.
    #[must_use]
    pub fn new(id: String, model: String, workspace_root: PathBuf) -> Self {
        Self {
            id,
            model,
            workspace_root,
            created_at: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Append an entry to the history.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
    }

    /// Number of entries of the given kind.
    #[must_use]
    pub fn count(&self, kind: HistoryKind) -> usize {
        self.history.iter().filter(|e| e.kind == kind).count()
    }
}
