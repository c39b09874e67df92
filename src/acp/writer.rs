//! ACP writer task and outbound queue.
//!
//! Every outbound message goes through one [`OutboundQueue`]. Callers
//! enqueue without waiting; a single [`run_writer`] task drains the queue
//! and writes each frame to the [`Transport`] strictly in enqueue order.
//! Because there is exactly one consumer, concurrent enqueues made while a
//! write is in flight extend the same drain rather than starting another.
//!
//! Write failures are logged and the frame is dropped. Nothing is retried
//! or requeued.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::message::Message;
use crate::transport::Transport;

struct Outbound {
    message: Message,
    ack: oneshot::Sender<bool>,
}

/// Completion handle for one enqueued message.
#[derive(Debug)]
pub struct Delivery(oneshot::Receiver<bool>);

impl Delivery {
    /// Wait until the writer has handled the message.
    ///
    /// Returns `true` only if the frame reached the transport. A failed
    /// write, a closed queue, or writer shutdown all yield `false`.
    pub async fn delivered(self) -> bool {
        self.0.await.unwrap_or(false)
    }
}

/// Cloneable FIFO handle feeding the single writer task.
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Outbound>,
}

impl OutboundQueue {
    /// Create a queue and the receiving half consumed by [`run_writer`].
    #[must_use]
    pub fn new() -> (Self, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, OutboundReceiver(rx))
    }

    /// Append `message` to the queue. Never waits on the transport.
    pub fn enqueue(&self, message: Message) -> Delivery {
        let (ack, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(rejected)) = self.tx.send(Outbound { message, ack }) {
            warn!(
                method = rejected.message.method(),
                "acp writer: queue closed, dropping outbound message"
            );
        }
        Delivery(rx)
    }
}

/// Receiving half of an [`OutboundQueue`].
#[derive(Debug)]
pub struct OutboundReceiver(mpsc::UnboundedReceiver<Outbound>);

/// ACP writer task. Drains the outbound queue into `transport`.
///
/// The task exits cleanly when:
/// - `cancel` is triggered (connection teardown), or
/// - every [`OutboundQueue`] handle has been dropped.
///
/// Messages still queued at cancellation are dropped and their
/// [`Delivery`] handles resolve to `false`.
pub async fn run_writer(
    transport: Arc<dyn Transport>,
    mut queue: OutboundReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("acp writer: cancellation received, stopping");
                break;
            }

            next = queue.0.recv() => {
                let Some(Outbound { message, ack }) = next else {
                    debug!("acp writer: queue closed, stopping");
                    break;
                };

                let frame = message.to_json().to_string();
                let delivered = match transport.send(frame).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(
                            error = %e,
                            method = message.method(),
                            "acp writer: write failed, dropping message"
                        );
                        false
                    }
                };

                // The caller may have stopped waiting; that is not an error.
                let _ = ack.send(delivered);
            }
        }
    }
}
