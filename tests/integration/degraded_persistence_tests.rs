//! Store failures after session creation: the turn carries on in memory.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use acp_conductor::models::session::HistoryKind;
use acp_conductor::orchestrator::{EngineConfig, SessionEngine};
use acp_conductor::persistence::{db, session_repo::SessionRepo};
use acp_conductor::transport::ChannelTransport;

use super::test_helpers::{
    call_tool, expect_request, next_frame, reply, start, Harness, ScriptedApprover, StubBehaviour,
    StubTools, Verdict,
};

#[tokio::test]
async fn failing_saves_do_not_stop_the_turn() {
    let temp = tempfile::tempdir().expect("tempdir");
    let pool = db::connect_memory().await.expect("db connect");
    let repo = SessionRepo::new(Arc::new(pool.clone()));
    let tools = StubTools::new(StubBehaviour::Succeed);
    let (transport, agent) = ChannelTransport::pair();
    let engine = SessionEngine::new(
        EngineConfig::new("test-model", temp.path().to_path_buf()),
        Arc::new(transport),
        tools.clone(),
        ScriptedApprover::always(Verdict::Approve),
    )
    .with_store(repo.clone());
    let mut h = Harness {
        engine,
        agent,
        repo,
    };
    start(&mut h).await;

    let Harness {
        engine,
        agent,
        repo,
    } = &mut h;
    let (outcome, ()) = tokio::join!(engine.send_prompt("hello"), async {
        let new = expect_request(agent, "session/new").await;
        reply(agent, &new, json!({"sessionId": "s1"}));
        let prompt = expect_request(agent, "session/prompt").await;

        // Every later save of the record is refused by the database.
        sqlx::query(
            "CREATE TRIGGER refuse_session_update BEFORE UPDATE ON session
             BEGIN SELECT RAISE(ABORT, 'disk full'); END",
        )
        .execute(&pool)
        .await
        .expect("install trigger");

        call_tool(
            agent,
            json!(5),
            "writeTextFile",
            json!({"path": "a.txt", "content": "hi"}),
        );
        let response = next_frame(agent).await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 5, "result": {}}));

        reply(agent, &prompt, json!({"stopReason": "end_turn"}));
    });

    assert_eq!(outcome.expect("prompt survives failed saves"), json!({"stopReason": "end_turn"}));
    assert_eq!(tools.write_count(), 1);

    let memory = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let session = engine.session().await.expect("session in memory");
            if session.history.len() == 2 {
                return session;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("in-memory history keeps growing");
    let kinds: Vec<_> = memory.history.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, [HistoryKind::Prompt, HistoryKind::ToolResult]);

    let stored = repo.load("s1").await.expect("load").expect("created record");
    assert_eq!(stored.count(HistoryKind::ToolResult), 0);
    assert!(engine.is_connected());
}
