//! Connection loss and write failures.

use std::time::Duration;

use serde_json::json;

use acp_conductor::models::session::HistoryKind;
use acp_conductor::AppError;

use super::test_helpers::{
    call_tool, expect_request, harness, reply, start, Harness, ScriptedApprover, StubBehaviour,
    StubTools, Verdict,
};

#[tokio::test]
async fn stream_close_abandons_pending_prompt() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::Succeed);
    let mut h = harness(temp.path(), tools, ScriptedApprover::always(Verdict::Approve)).await;
    start(&mut h).await;

    let Harness { engine, agent, .. } = &mut h;
    let (outcome, ()) = tokio::join!(engine.send_prompt("hello"), async {
        let new = expect_request(agent, "session/new").await;
        reply(agent, &new, json!({"sessionId": "s1"}));
        expect_request(agent, "session/prompt").await;
        agent.close_stream();
    });

    let err = outcome.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)), "got {err}");
    assert!(!engine.is_connected());
    tokio::time::timeout(Duration::from_secs(5), engine.closed())
        .await
        .expect("closed resolves once the stream ends");
}

#[tokio::test]
async fn undelivered_prompt_leaves_history_untouched() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::Succeed);
    let mut h = harness(temp.path(), tools, ScriptedApprover::always(Verdict::Approve)).await;
    start(&mut h).await;

    let Harness { engine, agent, .. } = &mut h;
    let (first, ()) = tokio::join!(engine.send_prompt("one"), async {
        let new = expect_request(agent, "session/new").await;
        reply(agent, &new, json!({"sessionId": "s1"}));
        let prompt = expect_request(agent, "session/prompt").await;
        reply(agent, &prompt, json!({"stopReason": "end_turn"}));
    });
    first.expect("first prompt");

    agent.fail_writes(true);
    let err = engine.send_prompt("two").await.unwrap_err();
    assert!(matches!(err, AppError::Transport(_)), "got {err}");

    let session = engine.session().await.expect("session");
    assert_eq!(session.count(HistoryKind::Prompt), 1);
    assert!(engine.is_connected(), "a failed write does not close the stream");
}

#[tokio::test]
async fn teardown_during_approval_sends_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let tools = StubTools::new(StubBehaviour::Succeed);
    let approver = ScriptedApprover::always(Verdict::Hang);
    let mut h = harness(temp.path(), tools.clone(), approver.clone()).await;
    start(&mut h).await;

    call_tool(&h.agent, json!(1), "writeTextFile", json!({"path": "a", "content": "b"}));
    tokio::time::timeout(Duration::from_secs(5), async {
        while approver.seen_count() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("approval requested");

    h.agent.close_stream();
    h.engine.shutdown().await;

    let nothing = tokio::time::timeout(Duration::from_millis(200), h.agent.recv()).await;
    assert!(
        matches!(nothing, Err(_) | Ok(None)),
        "no response may be sent after teardown, got {nothing:?}"
    );
    assert_eq!(tools.write_count(), 0);
}
