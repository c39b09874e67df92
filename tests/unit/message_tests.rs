//! Unit tests for JSON-RPC frame parsing and rendering.

use serde_json::json;

use acp_conductor::acp::message::{parse_frame, Message, RequestId, RpcError, USER_REJECTED};
use acp_conductor::AppError;

#[test]
fn request_with_id_and_method() {
    let msg = parse_frame(r#"{"jsonrpc":"2.0","id":3,"method":"fs/writeTextFile","params":{"path":"a"}}"#)
        .unwrap()
        .unwrap();

    assert_eq!(
        msg,
        Message::Request {
            id: RequestId::from_u64(3),
            method: "fs/writeTextFile".into(),
            params: json!({"path": "a"}),
        }
    );
}

#[test]
fn notification_has_no_id() {
    let msg = parse_frame(r#"{"jsonrpc":"2.0","method":"session/update","params":{"x":1}}"#)
        .unwrap()
        .unwrap();

    assert!(matches!(msg, Message::Notification { ref method, .. } if method == "session/update"));
}

#[test]
fn error_response_keeps_code_and_message() {
    let msg = parse_frame(r#"{"jsonrpc":"2.0","id":9,"error":{"code":-32000,"message":"no"}}"#)
        .unwrap()
        .unwrap();

    assert_eq!(
        msg,
        Message::Response {
            id: RequestId::from_u64(9),
            outcome: Err(RpcError::new(USER_REJECTED, "no")),
        }
    );
}

#[test]
fn blank_frame_is_skipped() {
    assert_eq!(parse_frame("   ").unwrap(), None);
}

#[test]
fn non_json_is_malformed() {
    let err = parse_frame("not json").unwrap_err();
    assert!(matches!(err, AppError::Acp(ref msg) if msg.contains("malformed json")));
}

#[test]
fn envelope_without_method_or_id_is_rejected() {
    assert!(parse_frame(r#"{"jsonrpc":"2.0","result":{}}"#).is_err());
    assert!(parse_frame("[1,2]").is_err());
}

#[test]
fn outbound_request_renders_envelope() {
    let rendered = Message::request(0, "initialize", json!({"protocolVersion": 1})).to_json();

    assert_eq!(
        rendered,
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {"protocolVersion": 1},
        })
    );
}

#[test]
fn error_reply_echoes_string_id() {
    let rendered =
        Message::error(RequestId::Str("req-7".into()), USER_REJECTED, "User rejected tool call")
            .to_json();

    assert_eq!(rendered["id"], json!("req-7"));
    assert_eq!(rendered["error"]["code"], json!(-32000));
    assert!(rendered.get("result").is_none());
}
