//! In-process transport backed by tokio channels.
//!
//! [`ChannelTransport::pair`] returns the client-side transport and an
//! [`AgentEndpoint`] that plays the agent: frames it sends appear on the
//! client's inbound stream, and frames the client writes arrive at
//! [`AgentEndpoint::recv`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::stream;
use serde_json::Value;
use tokio::sync::mpsc;

use super::{BoxFuture, FrameStream, Transport};
use crate::{AppError, Result};

/// Client half of an in-process connection.
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    outbound: mpsc::UnboundedSender<String>,
    fail_writes: Arc<AtomicBool>,
}

/// Agent half of an in-process connection.
#[derive(Debug)]
pub struct AgentEndpoint {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
    fail_writes: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a connected transport/endpoint pair.
    #[must_use]
    pub fn pair() -> (Self, AgentEndpoint) {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let fail_writes = Arc::new(AtomicBool::new(false));
        (
            Self {
                inbound: Mutex::new(Some(inbound)),
                outbound,
                fail_writes: Arc::clone(&fail_writes),
            },
            AgentEndpoint {
                to_client: Some(to_client),
                from_client,
                fail_writes,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn open(&self) -> BoxFuture<'_, Result<FrameStream>> {
        Box::pin(async move {
            let rx = self
                .inbound
                .lock()
                .map_err(|_| AppError::Transport("channel transport mutex poisoned".into()))?
                .take()
                .ok_or_else(|| AppError::Transport("channel transport already opened".into()))?;
            let frames = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|frame| (Ok(frame), rx))
            });
            let frames: FrameStream = Box::pin(frames);
            Ok(frames)
        })
    }

    fn send(&self, frame: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Transport("write rejected".into()));
            }
            self.outbound
                .send(frame)
                .map_err(|_| AppError::Transport("agent endpoint dropped".into()))
        })
    }
}

impl AgentEndpoint {
    /// Push a JSON frame to the client.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the stream was closed or the
    /// client side has been dropped.
    pub fn send(&self, frame: &Value) -> Result<()> {
        self.send_raw(frame.to_string())
    }

    /// Push an arbitrary text frame to the client, JSON or not.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] if the stream was closed or the
    /// client side has been dropped.
    pub fn send_raw(&self, frame: String) -> Result<()> {
        self.to_client
            .as_ref()
            .ok_or_else(|| AppError::Transport("stream already closed".into()))?
            .send(frame)
            .map_err(|_| AppError::Transport("client dropped".into()))
    }

    /// Receive the next frame written by the client, parsed as JSON.
    ///
    /// Returns `None` once the client transport is dropped.
    pub async fn recv(&mut self) -> Option<Value> {
        let frame = self.from_client.recv().await?;
        serde_json::from_str(&frame).ok()
    }

    /// End the inbound stream as seen by the client.
    pub fn close_stream(&mut self) {
        self.to_client = None;
    }

    /// Make subsequent client writes fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}
