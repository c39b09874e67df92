//! Unit tests for request/response correlation.
//!
//! Covers id allocation order, at-most-once resolution, stray responses,
//! peer request classification and abandonment.

use serde_json::json;

use acp_conductor::acp::correlator::{Correlator, Inbound};
use acp_conductor::acp::message::{Message, RequestId, RpcError};

#[test]
fn ids_start_at_zero_and_increase() {
    let correlator = Correlator::new();

    let (first, _rx1) = correlator.submit("initialize");
    let (second, _rx2) = correlator.submit("session/new");

    assert_eq!(first, 0);
    assert_eq!(second, 1);
    assert_eq!(correlator.pending_count(), 2);
}

#[tokio::test]
async fn response_resolves_waiter_exactly_once() {
    let correlator = Correlator::new();
    let (id, rx) = correlator.submit("session/prompt");

    let first = correlator.observe(Message::result(RequestId::from_u64(id), json!({"ok": true})));
    let second = correlator.observe(Message::result(RequestId::from_u64(id), json!({"ok": false})));

    assert_eq!(
        first,
        Inbound::Resolved {
            id,
            method: "session/prompt".into()
        }
    );
    assert_eq!(
        second,
        Inbound::Unmatched {
            id: RequestId::from_u64(id)
        }
    );
    assert_eq!(rx.await.unwrap(), Ok(json!({"ok": true})));
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn error_outcome_is_delivered() {
    let correlator = Correlator::new();
    let (id, rx) = correlator.submit("session/new");

    correlator.observe(Message::error(RequestId::from_u64(id), -32601, "unknown"));

    assert_eq!(rx.await.unwrap(), Err(RpcError::new(-32601, "unknown")));
}

#[test]
fn unknown_and_string_ids_are_unmatched() {
    let correlator = Correlator::new();
    let (_id, _rx) = correlator.submit("initialize");

    let unknown = correlator.observe(Message::result(RequestId::from_u64(42), json!({})));
    let string = correlator.observe(Message::result(RequestId::Str("0".into()), json!({})));

    assert!(matches!(unknown, Inbound::Unmatched { .. }));
    assert!(matches!(string, Inbound::Unmatched { .. }));
    assert_eq!(correlator.pending_count(), 1, "pending entry must survive stray responses");
}

#[test]
fn requests_and_notifications_are_classified() {
    let correlator = Correlator::new();

    let request = correlator.observe(Message::Request {
        id: RequestId::Str("t-1".into()),
        method: "fs/readTextFile".into(),
        params: json!({"path": "x"}),
    });
    let notification = correlator.observe(Message::Notification {
        method: "session/update".into(),
        params: json!({}),
    });

    let Inbound::PeerRequest(peer) = request else {
        panic!("expected peer request, got {request:?}");
    };
    assert_eq!(peer.id, RequestId::Str("t-1".into()));
    assert_eq!(peer.method, "fs/readTextFile");
    assert!(matches!(notification, Inbound::Notification { .. }));
}

#[tokio::test]
async fn abandon_all_wakes_every_waiter() {
    let correlator = Correlator::new();
    let (_a, rx_a) = correlator.submit("session/new");
    let (b, rx_b) = correlator.submit("session/prompt");

    correlator.abandon_all();

    assert!(rx_a.await.is_err());
    assert!(rx_b.await.is_err());
    assert_eq!(correlator.pending_count(), 0);
    assert!(matches!(
        correlator.observe(Message::result(RequestId::from_u64(b), json!({}))),
        Inbound::Unmatched { .. }
    ));
}

#[tokio::test]
async fn abandon_single_request() {
    let correlator = Correlator::new();
    let (id, rx) = correlator.submit("session/prompt");
    let (_other, _rx_other) = correlator.submit("session/prompt");

    correlator.abandon(id);

    assert!(rx.await.is_err());
    assert_eq!(correlator.pending_count(), 1);
}
