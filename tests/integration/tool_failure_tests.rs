//! Tool failures are reported to the agent, never to the local caller.

use serde_json::json;

use acp_conductor::models::session::HistoryKind;

use super::test_helpers::{
    call_tool, expect_request, harness, next_frame, reply, start, Harness, ScriptedApprover,
    StubBehaviour, StubTools, Verdict,
};

#[tokio::test]
async fn tool_error_answers_minus_32603_with_message() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::FailWith("disk full".into()));
    let mut h = harness(temp.path(), tools, ScriptedApprover::always(Verdict::Approve)).await;
    start(&mut h).await;

    let Harness { engine, agent, .. } = &mut h;
    let (outcome, ()) = tokio::join!(engine.send_prompt("save it"), async {
        let new = expect_request(agent, "session/new").await;
        reply(agent, &new, json!({"sessionId": "s1"}));
        let prompt = expect_request(agent, "session/prompt").await;

        call_tool(agent, json!(3), "writeTextFile", json!({"path": "a.txt", "content": "hi"}));
        let response = next_frame(agent).await;
        assert_eq!(
            response,
            json!({"jsonrpc": "2.0", "id": 3, "error": {"code": -32603, "message": "disk full"}})
        );

        reply(agent, &prompt, json!({"stopReason": "end_turn"}));
    });

    outcome.expect("tool failure must not fail the prompt");
    let session = engine.session().await.expect("session");
    assert_eq!(session.count(HistoryKind::ToolResult), 0);
}

#[tokio::test]
async fn panicking_tool_is_reported_as_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::Panic);
    let mut h = harness(temp.path(), tools, ScriptedApprover::always(Verdict::Approve)).await;
    start(&mut h).await;

    call_tool(&h.agent, json!("p-1"), "terminal/create", json!({"command": "ls"}));
    let response = next_frame(&mut h.agent).await;

    assert_eq!(response["id"], json!("p-1"));
    assert_eq!(response["error"]["code"], json!(-32603));

    call_tool(&h.agent, json!("p-2"), "createTerminal", json!({"command": "ls"}));
    let again = next_frame(&mut h.agent).await;
    assert_eq!(again["id"], json!("p-2"), "dispatcher must survive a panicking tool");
}

#[tokio::test]
async fn command_result_has_terminal_shape() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::Succeed);
    let mut h = harness(temp.path(), tools, ScriptedApprover::always(Verdict::Approve)).await;
    start(&mut h).await;

    call_tool(
        &h.agent,
        json!(12),
        "fs/createTerminal",
        json!({"command": "cargo", "args": ["--version"]}),
    );
    let response = next_frame(&mut h.agent).await;

    assert_eq!(
        response["result"],
        json!({"id": "term-1", "exitCode": 0, "stdout": "", "stderr": ""})
    );
}
