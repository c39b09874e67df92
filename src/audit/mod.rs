//! Append-only audit trail of session activity.
//!
//! Every prompt, tool call, operator decision and tool outcome produces one
//! [`AuditEntry`]. Tool calls are recorded before the approval wait, so an
//! interrupted approval still leaves a trace. The primary implementation,
//! [`JsonlAuditWriter`], appends JSONL records to daily-rotating files.
//!
//! Audit failures never interrupt the session: callers go through
//! [`record`], which downgrades write errors to a `WARN` log.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Event type classification for audit log entries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Connection established and handshake completed.
    SessionStart,
    /// Session restored from the store.
    SessionResume,
    /// Prompt delivered to the agent.
    PromptSent,
    /// Agent requested a tool call.
    ToolCall,
    /// Operator approved a tool call.
    Approval,
    /// Operator rejected a tool call.
    Rejection,
    /// Tool call succeeded and the result was returned.
    ToolResult,
    /// Tool call failed or could not be answered.
    ToolError,
    /// Connection closed.
    SessionEnd,
}

/// A structured record of one session event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    /// ISO 8601 timestamp with timezone.
    pub timestamp: DateTime<Utc>,
    /// Event classification.
    pub event_type: AuditEventType,
    /// Agent-assigned session identifier, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Tool kind (for tool events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Peer request identifier (for tool events).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Event payload: prompt text, tool parameters, or tool result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Failure or rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEntry {
    /// Construct a minimal audit entry for the given event type.
    #[must_use]
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            timestamp: Utc::now(),
            event_type,
            session_id: None,
            tool: None,
            request_id: None,
            payload: None,
            reason: None,
        }
    }

    /// Set the session identifier, if one is known.
    #[must_use]
    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the tool kind.
    #[must_use]
    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tool = Some(tool.to_owned());
        self
    }

    /// Set the peer request identifier.
    #[must_use]
    pub fn with_request_id(mut self, request_id: String) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Set the event payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the failure or rejection reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Writes structured audit entries to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait AuditLogger: Send + Sync {
    /// Record a single audit entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn log_entry(&self, entry: AuditEntry) -> crate::Result<()>;
}

/// Record `entry` if a logger is configured, logging failures instead of
/// returning them.
pub fn record(logger: Option<&dyn AuditLogger>, entry: AuditEntry) {
    let Some(logger) = logger else {
        return;
    };
    let event_type = entry.event_type;
    if let Err(err) = logger.log_entry(entry) {
        warn!(%err, ?event_type, "audit: failed to record entry");
    }
}

pub use writer::JsonlAuditWriter;
