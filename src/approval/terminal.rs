//! Interactive approval on the controlling terminal.

use std::io::Write;

use tracing::debug;

use super::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::console::Console;
use crate::transport::BoxFuture;
use crate::{AppError, Result};

/// Prompts on stderr and reads the verdict from the shared [`Console`].
///
/// `y` or `yes` (any case) approves; any other answer rejects.
#[derive(Debug, Clone)]
pub struct TerminalApprover {
    console: Console,
}

impl TerminalApprover {
    /// Create an approver reading from `console`.
    #[must_use]
    pub fn new(console: Console) -> Self {
        Self { console }
    }
}

/// Interpret one line of operator input.
#[must_use]
pub fn parse_answer(answer: &str) -> ApprovalDecision {
    match answer.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ApprovalDecision::Approved,
        _ => ApprovalDecision::Rejected,
    }
}

impl ApprovalGate for TerminalApprover {
    fn decide<'a>(&'a self, request: &'a ApprovalRequest) -> BoxFuture<'a, Result<ApprovalDecision>> {
        Box::pin(async move {
            let params = serde_json::to_string_pretty(&request.params)
                .unwrap_or_else(|_| request.params.to_string());
            {
                let mut err = std::io::stderr().lock();
                writeln!(err, "\n── tool call: {} ──\n{params}", request.tool)
                    .and_then(|()| write!(err, "approve? [y/N] "))
                    .and_then(|()| err.flush())
                    .map_err(|e| AppError::Io(format!("cannot prompt operator: {e}")))?;
            }

            let answer = self
                .console
                .next_answer()
                .await?
                .ok_or_else(|| AppError::Io("operator input closed".into()))?;
            let decision = parse_answer(&answer);
            debug!(request_id = %request.request_id, ?decision, "approval: operator answered");
            Ok(decision)
        })
    }
}
