//! ACP reader task.
//!
//! Pulls frames from the transport's inbound stream, decodes each one with
//! [`parse_frame`], and routes the [`Correlator`]'s classification:
//!
//! | Classification        | Action                                          |
//! |-----------------------|-------------------------------------------------|
//! | response, matched     | delivered to the waiting caller by the correlator |
//! | response, unmatched   | logged at `WARN`, dropped                       |
//! | peer request          | queued for the tool dispatcher                  |
//! | notification          | forwarded to the update subscriber, if any      |
//! | malformed frame       | logged at `WARN`, skipped                       |
//!
//! The reader never waits on tool execution or operator approval, so
//! responses keep resolving while a tool call is parked at the gate.
//!
//! When the stream ends or fails, the reader cancels the connection token
//! and abandons every pending request.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::correlator::{Correlator, Inbound, PeerRequest};
use super::message::parse_frame;
use crate::transport::FrameStream;
use crate::AppError;

/// Agent notification surfaced to the embedding application.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpdate {
    /// Notification method, typically `session/update`.
    pub method: String,
    /// Raw parameters.
    pub params: Value,
}

impl AgentUpdate {
    /// Text of an `agent_message_chunk` update, if this is one.
    #[must_use]
    pub fn message_text(&self) -> Option<&str> {
        let update = self.params.get("update")?;
        if update.get("sessionUpdate")?.as_str()? != "agent_message_chunk" {
            return None;
        }
        update.get("content")?.get("text")?.as_str()
    }
}

/// Destinations for classified inbound traffic.
#[derive(Debug, Clone)]
pub struct InboundRoutes {
    /// Peer requests awaiting the tool dispatcher.
    pub peer_requests: mpsc::UnboundedSender<PeerRequest>,
    /// Optional notification subscriber.
    pub updates: Option<mpsc::UnboundedSender<AgentUpdate>>,
}

/// ACP reader task. Classifies inbound frames until the stream ends.
///
/// Respects `cancel`: when the token fires the reader exits. On every exit
/// path the token is cancelled and pending requests are abandoned, so the
/// writer and dispatcher stop as well.
pub async fn run_reader(
    mut frames: FrameStream,
    correlator: Arc<Correlator>,
    routes: InboundRoutes,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("acp reader: cancellation received, stopping");
                break;
            }

            item = frames.next() => {
                match item {
                    None => {
                        debug!("acp reader: EOF detected");
                        break;
                    }

                    Some(Err(AppError::Acp(ref msg))) => {
                        // Protocol-level frame error: log and continue.
                        warn!(error = msg.as_str(), "acp reader: framing error, skipping");
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "acp reader: stream error, stopping");
                        break;
                    }

                    Some(Ok(frame)) => route_frame(&frame, &correlator, &routes),
                }
            }
        }
    }

    cancel.cancel();
    correlator.abandon_all();
}

/// Decode and route a single frame.
fn route_frame(frame: &str, correlator: &Correlator, routes: &InboundRoutes) {
    let message = match parse_frame(frame) {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(e) => {
            warn!(error = %e, raw_frame = frame, "acp reader: parse error, skipping frame");
            return;
        }
    };

    match correlator.observe(message) {
        Inbound::Resolved { id, method } => {
            debug!(request_id = id, method = method.as_str(), "acp reader: response delivered");
        }
        Inbound::Unmatched { id } => {
            warn!(request_id = %id, "acp reader: response matches no pending request, dropping");
        }
        Inbound::PeerRequest(request) => {
            debug!(request_id = %request.id, method = request.method.as_str(), "acp reader: peer request");
            if routes.peer_requests.send(request).is_err() {
                debug!("acp reader: dispatcher gone, dropping peer request");
            }
        }
        Inbound::Notification { method, params } => match &routes.updates {
            Some(tx) => {
                if tx.send(AgentUpdate { method, params }).is_err() {
                    debug!("acp reader: update subscriber gone");
                }
            }
            None => debug!(method = method.as_str(), "acp reader: notification without subscriber, discarding"),
        },
    }
}
