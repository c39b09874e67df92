//! Request/response correlation for one agent connection.
//!
//! The [`Correlator`] allocates identifiers for outbound requests, keeps a
//! table of pending entries, and classifies every inbound [`Message`] as a
//! response to a known request, a stray response, a peer request, or a
//! notification.
//!
//! Each pending entry owns a [`oneshot::Sender`]; resolving removes the
//! entry, so a second response with the same id finds nothing and is
//! reported as [`Inbound::Unmatched`]. Abandoning drops the senders, which
//! wakes every waiter with a closed-channel error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::message::{Message, Outcome, RequestId};

/// An outbound request awaiting its response.
#[derive(Debug)]
pub struct PendingRequest {
    /// Identifier allocated by [`Correlator::submit`].
    pub id: u64,
    /// Method that was called.
    pub method: String,
    /// Submission time.
    pub submitted_at: DateTime<Utc>,
    reply: oneshot::Sender<Outcome>,
}

/// A request initiated by the agent that expects a client reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerRequest {
    /// Identifier as sent by the peer; echoed verbatim in the reply.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// Raw parameters.
    pub params: Value,
}

/// Classification of one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Response matched a pending request and was delivered to its waiter.
    Resolved {
        /// Identifier of the resolved request.
        id: u64,
        /// Method of the resolved request.
        method: String,
    },
    /// Response whose id matched nothing pending.
    Unmatched {
        /// Identifier as received.
        id: RequestId,
    },
    /// Agent-initiated request.
    PeerRequest(PeerRequest),
    /// Agent-initiated notification.
    Notification {
        /// Method name.
        method: String,
        /// Raw parameters.
        params: Value,
    },
}

/// Identifier allocator and pending-request table.
#[derive(Debug, Default)]
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, PendingRequest>>,
}

impl Correlator {
    /// Create an empty correlator; the first identifier is `0`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new outbound request.
    ///
    /// Returns the allocated identifier and a receiver that resolves with
    /// the response outcome. The receiver errors if the request is
    /// abandoned before a response arrives.
    pub fn submit(&self, method: &str) -> (u64, oneshot::Receiver<Outcome>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (reply, rx) = oneshot::channel();
        let entry = PendingRequest {
            id,
            method: method.to_owned(),
            submitted_at: Utc::now(),
            reply,
        };
        self.lock().insert(id, entry);
        debug!(request_id = id, method, "correlator: request submitted");
        (id, rx)
    }

    /// Classify an inbound message, resolving a pending request when it
    /// is the matching response.
    pub fn observe(&self, message: Message) -> Inbound {
        match message {
            Message::Request { id, method, params } => {
                Inbound::PeerRequest(PeerRequest { id, method, params })
            }
            Message::Notification { method, params } => Inbound::Notification { method, params },
            Message::Response { id, outcome } => {
                let entry = id.as_u64().and_then(|n| self.lock().remove(&n));
                let Some(entry) = entry else {
                    return Inbound::Unmatched { id };
                };
                let latency_ms = (Utc::now() - entry.submitted_at).num_milliseconds();
                debug!(
                    request_id = entry.id,
                    method = entry.method.as_str(),
                    latency_ms,
                    "correlator: response matched"
                );
                if entry.reply.send(outcome).is_err() {
                    debug!(request_id = entry.id, "correlator: waiter already gone");
                }
                Inbound::Resolved {
                    id: entry.id,
                    method: entry.method,
                }
            }
        }
    }

    /// Drop one pending request without resolving it.
    pub fn abandon(&self, id: u64) {
        if self.lock().remove(&id).is_some() {
            debug!(request_id = id, "correlator: request abandoned");
        }
    }

    /// Drop every pending request; each waiter observes a closed channel.
    pub fn abandon_all(&self) {
        let drained: Vec<PendingRequest> = self.lock().drain().map(|(_, entry)| entry).collect();
        if !drained.is_empty() {
            warn!(
                count = drained.len(),
                "correlator: abandoning pending requests"
            );
        }
    }

    /// Number of requests still awaiting a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingRequest>> {
        // The table holds no invariants a panicking holder could break.
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
