//! JSON-RPC 2.0 message model for ACP traffic.
//!
//! Requests, responses, and notifications share one stream in both
//! directions. Inbound frames are decoded into [`Message`] by
//! [`parse_frame`]; outbound messages are rendered with
//! [`Message::to_json`].

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::{AppError, Result};

/// JSON-RPC error code: operator declined the tool call.
pub const USER_REJECTED: i64 = -32000;
/// JSON-RPC error code: tool parameters did not match the expected shape.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC error code: tool execution failed.
pub const INTERNAL_ERROR: i64 = -32603;

/// Request identifier as it appears on the wire.
///
/// Outbound requests always use numbers. Peer requests may use either
/// form, and the identifier is echoed back exactly as received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// Numeric identifier (kept as a JSON number to preserve its spelling).
    Number(serde_json::Number),
    /// String identifier.
    Str(String),
}

impl RequestId {
    /// Numeric identifier for an outbound request.
    #[must_use]
    pub fn from_u64(id: u64) -> Self {
        Self::Number(id.into())
    }

    /// The value as `u64`, when it is a non-negative integer.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Number(n) => n.as_u64(),
            Self::Str(_) => None,
        }
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i64,
    /// Human-readable description.
    pub message: String,
    /// Optional structured detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    /// Construct an error without `data`.
    #[must_use]
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Result half of a response: exactly one of `result` or `error`.
pub type Outcome = std::result::Result<Value, RpcError>;

/// A decoded JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Call expecting a correlated response.
    Request {
        /// Correlation identifier.
        id: RequestId,
        /// Method name.
        method: String,
        /// Method parameters (`Value::Null` when absent).
        params: Value,
    },
    /// Reply to an earlier request.
    Response {
        /// Identifier copied from the request.
        id: RequestId,
        /// Success payload or error object.
        outcome: Outcome,
    },
    /// One-way message with no identifier.
    Notification {
        /// Method name.
        method: String,
        /// Method parameters (`Value::Null` when absent).
        params: Value,
    },
}

impl Message {
    /// Build an outbound request.
    #[must_use]
    pub fn request(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self::Request {
            id: RequestId::from_u64(id),
            method: method.into(),
            params,
        }
    }

    /// Build a success response.
    #[must_use]
    pub fn result(id: RequestId, result: Value) -> Self {
        Self::Response {
            id,
            outcome: Ok(result),
        }
    }

    /// Build an error response.
    #[must_use]
    pub fn error(id: RequestId, code: i64, message: impl Into<String>) -> Self {
        Self::Response {
            id,
            outcome: Err(RpcError::new(code, message)),
        }
    }

    /// Method name for requests and notifications.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } => None,
        }
    }

    /// Render the message as a JSON-RPC 2.0 envelope.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Request { id, method, params } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }),
            Self::Response {
                id,
                outcome: Ok(result),
            } => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
            Self::Response {
                id,
                outcome: Err(error),
            } => json!({ "jsonrpc": "2.0", "id": id, "error": error }),
            Self::Notification { method, params } => json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
            }),
        }
    }
}

/// Parse one inbound frame into a [`Message`].
///
/// # Return value
///
/// - `Ok(Some(message))`: a well-formed envelope.
/// - `Ok(None)`: the frame is blank.
///
/// # Errors
///
/// Returns [`AppError::Acp`] when the frame is not a JSON object, carries
/// neither `method` nor `id`, or has an `error` member of the wrong shape.
pub fn parse_frame(frame: &str) -> Result<Option<Message>> {
    let trimmed = frame.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| AppError::Acp(format!("malformed json: {e}")))?;
    let Value::Object(mut object) = value else {
        return Err(AppError::Acp("malformed json: frame is not an object".into()));
    };

    let id = take_id(&mut object)?;
    let params = object.remove("params").unwrap_or(Value::Null);

    if let Some(method) = object.remove("method") {
        let Value::String(method) = method else {
            return Err(AppError::Acp("malformed envelope: `method` is not a string".into()));
        };
        return Ok(Some(match id {
            Some(id) => Message::Request { id, method, params },
            None => Message::Notification { method, params },
        }));
    }

    let Some(id) = id else {
        return Err(AppError::Acp(
            "malformed envelope: neither `method` nor `id` present".into(),
        ));
    };

    let outcome = match object.remove("error") {
        Some(Value::Null) | None => Ok(object.remove("result").unwrap_or(Value::Null)),
        Some(error) => Err(serde_json::from_value::<RpcError>(error)
            .map_err(|e| AppError::Acp(format!("malformed error object: {e}")))?),
    };

    Ok(Some(Message::Response { id, outcome }))
}

fn take_id(object: &mut Map<String, Value>) -> Result<Option<RequestId>> {
    match object.remove("id") {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| AppError::Acp(format!("malformed envelope: invalid `id`: {e}"))),
    }
}
