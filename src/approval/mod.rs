//! Operator approval gate for agent tool calls.
//!
//! Every tool call passes through an [`ApprovalGate`] before it runs. The
//! gate is the one place where the otherwise event-driven pipeline waits
//! on a human; the dispatcher parks only the tool call under review while
//! the reader keeps classifying other traffic.

pub mod terminal;

use serde_json::Value;

use crate::acp::message::RequestId;
use crate::tools::ToolKind;
use crate::transport::BoxFuture;
use crate::Result;

/// What the operator is asked to approve.
#[derive(Debug, Clone, PartialEq)]
pub struct ApprovalRequest {
    /// Peer request identifier.
    pub request_id: RequestId,
    /// Tool the agent wants to run.
    pub tool: ToolKind,
    /// Validated parameters, as JSON for display.
    pub params: Value,
}

/// Operator verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Run the tool.
    Approved,
    /// Refuse the tool call.
    Rejected,
}

impl ApprovalDecision {
    /// `true` for [`ApprovalDecision::Approved`].
    #[must_use]
    pub fn is_approved(self) -> bool {
        matches!(self, Self::Approved)
    }
}

/// Source of operator decisions.
pub trait ApprovalGate: Send + Sync {
    /// Ask the operator about `request` and wait for the answer.
    ///
    /// # Errors
    ///
    /// Returns an error if no decision can be obtained (e.g. operator
    /// input closed). The dispatcher treats that as a rejection.
    fn decide<'a>(&'a self, request: &'a ApprovalRequest) -> BoxFuture<'a, Result<ApprovalDecision>>;
}

pub use terminal::TerminalApprover;
