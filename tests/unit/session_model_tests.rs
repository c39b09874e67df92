//! Unit tests for the session record shape.

use serde_json::json;

use acp_conductor::models::session::{HistoryEntry, HistoryKind, Session};

#[test]
fn session_serialises_to_record_shape() {
    let mut session = Session::new("s1".into(), "m".into(), "/ws".into());
    session.record(HistoryEntry::new(HistoryKind::Prompt, json!({"text": "hello"})));

    let value = serde_json::to_value(&session).unwrap();

    assert_eq!(value["sessionId"], json!("s1"));
    assert_eq!(value["workspaceDir"], json!("/ws"));
    assert!(value["timestamp"].is_string());
    assert_eq!(value["history"][0]["type"], json!("prompt"));
    assert_eq!(value["history"][0]["data"], json!({"text": "hello"}));
    assert!(value["history"][0]["timestamp"].is_string());
}

#[test]
fn history_kinds_use_snake_case() {
    assert_eq!(serde_json::to_value(HistoryKind::ToolCall).unwrap(), json!("tool_call"));
    assert_eq!(serde_json::to_value(HistoryKind::ToolResult).unwrap(), json!("tool_result"));
}

#[test]
fn count_filters_by_kind() {
    let mut session = Session::new("s1".into(), "m".into(), "/ws".into());
    session.record(HistoryEntry::new(HistoryKind::Prompt, json!({})));
    session.record(HistoryEntry::new(HistoryKind::ToolResult, json!({})));
    session.record(HistoryEntry::new(HistoryKind::Prompt, json!({})));

    assert_eq!(session.count(HistoryKind::Prompt), 2);
    assert_eq!(session.count(HistoryKind::ToolResult), 1);
    assert_eq!(session.count(HistoryKind::ToolCall), 0);
}
