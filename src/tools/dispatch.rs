//! Tool dispatch behind the approval gate.
//!
//! The reader hands every peer request to [`run_dispatcher`], which feeds
//! them one at a time to [`ToolDispatcher::handle`]. Each recognised tool
//! call gets exactly one response:
//!
//! | Outcome                         | Response                  |
//! |---------------------------------|---------------------------|
//! | parameters fail validation      | error `-32602`            |
//! | operator rejects (or gate fails)| error `-32000`            |
//! | tool succeeds                   | `result` with the payload |
//! | tool fails or panics            | error `-32603`            |
//!
//! The only exception is connection teardown: once the connection token
//! is cancelled nothing more is sent. Unrecognised methods are ignored.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use super::{execute, ToolHost, ToolInvocation, ToolKind, ToolParams};
use crate::acp::correlator::PeerRequest;
use crate::acp::message::{Message, RequestId, INTERNAL_ERROR, INVALID_PARAMS, USER_REJECTED};
use crate::acp::writer::OutboundQueue;
use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::audit::{self, AuditEntry, AuditEventType, AuditLogger};
use crate::models::session::HistoryKind;
use crate::orchestrator::state::SessionState;

/// Error message sent when the operator declines a tool call.
pub const REJECTED_MESSAGE: &str = "User rejected tool call";

/// Routes agent tool calls through approval, execution and response.
pub struct ToolDispatcher {
    tools: Arc<dyn ToolHost>,
    approver: Arc<dyn ApprovalGate>,
    outbound: OutboundQueue,
    state: Arc<SessionState>,
    audit: Option<Arc<dyn AuditLogger>>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher").finish_non_exhaustive()
    }
}

impl ToolDispatcher {
    /// Create a dispatcher for one connection.
    #[must_use]
    pub fn new(
        tools: Arc<dyn ToolHost>,
        approver: Arc<dyn ApprovalGate>,
        outbound: OutboundQueue,
        state: Arc<SessionState>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tools,
            approver,
            outbound,
            state,
            audit: None,
            cancel,
        }
    }

    /// Attach an audit logger.
    #[must_use]
    pub fn with_audit(mut self, audit: Option<Arc<dyn AuditLogger>>) -> Self {
        self.audit = audit;
        self
    }

    /// Handle one peer request to completion.
    pub async fn handle(&self, request: PeerRequest) {
        let PeerRequest { id, method, params } = request;
        let Some(kind) = ToolKind::from_method(&method) else {
            debug!(request_id = %id, method = method.as_str(), "dispatch: unrecognised method, ignoring");
            return;
        };

        let span = info_span!("tool_call", request_id = %id, tool = kind.as_str());
        self.handle_tool(id, kind, params).instrument(span).await;
    }

    async fn handle_tool(&self, id: RequestId, kind: ToolKind, raw: serde_json::Value) {
        let session_id = self.state.session_id().await;
        let request_label = id.to_string();
        let entry = |event| {
            AuditEntry::new(event)
                .with_session(session_id.clone())
                .with_tool(kind.as_str())
                .with_request_id(request_label.clone())
        };

        let params = match ToolParams::parse(kind, raw) {
            Ok(params) => params,
            Err(err) => {
                warn!(%err, "dispatch: invalid tool parameters");
                self.audit(entry(AuditEventType::ToolError).with_reason(err.to_string()));
                self.respond(Message::error(id, INVALID_PARAMS, err.to_string()))
                    .await;
                return;
            }
        };
        let invocation = ToolInvocation {
            request_id: id,
            params,
        };
        let display = invocation.params.to_json();
        self.audit(entry(AuditEventType::ToolCall).with_payload(display.clone()));

        let approval = ApprovalRequest {
            request_id: invocation.request_id.clone(),
            tool: kind,
            params: display,
        };
        let decision = tokio::select! {
            biased;

            () = self.cancel.cancelled() => {
                warn!("dispatch: connection closed while awaiting approval, aborting");
                return;
            }

            decision = self.approver.decide(&approval) => decision,
        };
        let decision = decision.unwrap_or_else(|err| {
            warn!(%err, "dispatch: approval unavailable, treating as rejection");
            ApprovalDecision::Rejected
        });

        let ToolInvocation { request_id, params } = invocation;
        if !decision.is_approved() {
            info!("dispatch: tool call rejected");
            self.audit(entry(AuditEventType::Rejection).with_reason(REJECTED_MESSAGE));
            self.respond(Message::error(request_id, USER_REJECTED, REJECTED_MESSAGE))
                .await;
            return;
        }
        self.audit(entry(AuditEventType::Approval));

        let tools = Arc::clone(&self.tools);
        let outcome = tokio::spawn(async move { execute(tools.as_ref(), &params).await })
            .await
            .unwrap_or_else(|join_err| Err(format!("tool execution panicked: {join_err}")));

        match outcome {
            Ok(result) => {
                let delivered = self
                    .respond(Message::result(request_id.clone(), result.clone()))
                    .await;
                if !delivered {
                    warn!("dispatch: tool result not delivered, history unchanged");
                    return;
                }
                info!("dispatch: tool result delivered");
                self.state
                    .append(
                        HistoryKind::ToolResult,
                        json!({
                            "requestId": request_id,
                            "tool": kind.as_str(),
                            "result": result,
                        }),
                    )
                    .await;
                self.audit(entry(AuditEventType::ToolResult).with_payload(result));
            }
            Err(message) => {
                warn!(error = message.as_str(), "dispatch: tool failed");
                self.audit(entry(AuditEventType::ToolError).with_reason(message.clone()));
                self.respond(Message::error(request_id, INTERNAL_ERROR, message))
                    .await;
            }
        }
    }

    /// Enqueue a response; `true` once it reached the transport.
    async fn respond(&self, message: Message) -> bool {
        if self.cancel.is_cancelled() {
            warn!("dispatch: connection closed, response not sent");
            return false;
        }
        self.outbound.enqueue(message).delivered().await
    }

    fn audit(&self, entry: AuditEntry) {
        audit::record(self.audit.as_deref(), entry);
    }
}

/// Dispatcher task: handles peer requests sequentially until the queue
/// closes or `cancel` fires.
pub async fn run_dispatcher(
    mut requests: mpsc::UnboundedReceiver<PeerRequest>,
    dispatcher: Arc<ToolDispatcher>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("dispatch: cancellation received, stopping");
                break;
            }

            next = requests.recv() => {
                let Some(request) = next else {
                    debug!("dispatch: request queue closed, stopping");
                    break;
                };
                dispatcher.handle(request).await;
            }
        }
    }
}
