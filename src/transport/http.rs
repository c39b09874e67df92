//! HTTP transport: server-sent events inbound, `POST` outbound.
//!
//! The agent server pushes one JSON-RPC object per SSE event on a
//! long-lived `GET` stream. The client sends each outbound object as the
//! body of its own `POST`. Replies to client requests arrive on the event
//! stream, never in the `POST` response body.

use futures_util::TryStreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tokio_util::codec::FramedRead;
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use super::{BoxFuture, FrameStream, Transport};
use crate::acp::codec::SseCodec;
use crate::config::ClientConfig;
use crate::{AppError, Result};

/// `reqwest`-backed SSE + `POST` transport.
#[derive(Debug, Clone)]
pub struct HttpSseTransport {
    client: reqwest::Client,
    events_url: String,
    rpc_url: String,
}

impl HttpSseTransport {
    /// Create a transport for explicit endpoint URLs.
    #[must_use]
    pub fn new(events_url: String, rpc_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            events_url,
            rpc_url,
        }
    }

    /// Create a transport for the endpoints named in `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.events_url(), config.rpc_url())
    }
}

impl Transport for HttpSseTransport {
    fn open(&self) -> BoxFuture<'_, Result<FrameStream>> {
        Box::pin(async move {
            let response = self
                .client
                .get(&self.events_url)
                .header(ACCEPT, "text/event-stream")
                .send()
                .await?
                .error_for_status()?;

            info!(url = %self.events_url, "http transport: event stream opened");

            let body = response
                .bytes_stream()
                .map_err(std::io::Error::other);
            let frames = FramedRead::new(StreamReader::new(body), SseCodec::new());
            let frames: FrameStream = Box::pin(frames);
            Ok(frames)
        })
    }

    fn send(&self, frame: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let response = self
                .client
                .post(&self.rpc_url)
                .header(CONTENT_TYPE, "application/json")
                .body(frame)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(AppError::Transport(format!(
                    "rpc endpoint returned {status}"
                )));
            }
            debug!(%status, "http transport: frame posted");
            Ok(())
        })
    }
}
