//! Bidirectional transport between the client and one agent.
//!
//! A [`Transport`] exposes a lazy inbound stream of raw frames (one JSON
//! object each) and a sink for outbound frames. The two halves fail
//! independently: a rejected write does not close the inbound stream, and
//! a dropped stream does not poison later writes.
//!
//! Implementations:
//! - [`http::HttpSseTransport`]: server-sent events in, HTTP `POST` out.
//! - [`channel::ChannelTransport`]: in-process pair for tests and embedding.

pub mod channel;
pub mod http;

use std::future::Future;
use std::pin::Pin;

use futures_util::Stream;

use crate::Result;

/// Boxed, sendable future used by the object-safe traits in this crate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Inbound frame stream. Each item is one undecoded JSON text.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Abstract agent connection.
pub trait Transport: Send + Sync {
    /// Open the inbound half.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// stream cannot be established.
    fn open(&self) -> BoxFuture<'_, Result<FrameStream>>;

    /// Write one serialised frame to the agent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the
    /// frame could not be delivered.
    fn send(&self, frame: String) -> BoxFuture<'_, Result<()>>;
}

pub use channel::{AgentEndpoint, ChannelTransport};
pub use http::HttpSseTransport;
