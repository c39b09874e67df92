//! Agent Client Protocol (ACP) stream handling.
//!
//! Submodules:
//! - `codec`: line and server-sent-event framing with a 1 MiB line cap.
//! - `message`: JSON-RPC 2.0 envelope model and frame parsing.
//! - `correlator`: outbound id allocation and inbound classification.
//! - `reader`: inbound task feeding the correlator and tool dispatcher.
//! - `writer`: single-drain outbound queue.
//! - `handshake`: `initialize` / `session/new` / `session/prompt` payloads.

pub mod codec;
pub mod correlator;
pub mod handshake;
pub mod message;
pub mod reader;
pub mod writer;
