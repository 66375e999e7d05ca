// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use serde_json::json;

use chatlink_core::envelope::{Envelope, EVENT_ERROR, EVENT_REPLY};
use chatlink_core::{MessageCategory, MessageStatus};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::router::route;
use crate::state::ClientInner;

fn inner() -> ClientInner {
    ClientInner::new(ClientConfig::default())
}

fn reply_frame(reference: &str, status: &str, response: serde_json::Value) -> String {
    Envelope {
        topic: "user:alice".to_string(),
        event: EVENT_REPLY.to_string(),
        payload: json!({ "status": status, "response": response }),
        reference: Some(reference.to_string()),
    }
    .to_json()
    .unwrap()
}

fn broadcast_frame(event_type: &str, payload: serde_json::Value) -> String {
    Envelope {
        topic: "user:alice".to_string(),
        event: "broadcast".to_string(),
        payload: json!({ "event_type": event_type, "payload": payload }),
        reference: None,
    }
    .to_json()
    .unwrap()
}

fn message_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "conversation_id": "conv-1",
        "sender_id": "bob",
        "content": "hi",
        "inserted_at": "2026-08-30T12:00:00Z",
    })
}

#[tokio::test]
async fn ok_reply_resolves_the_pending_request() {
    let inner = inner();
    let (reference, rx) = inner.pending.register();

    route(&inner, &reply_frame(&reference, "ok", json!({ "n": 1 })));

    let result = rx.await.unwrap().unwrap();
    assert_eq!(result, json!({ "n": 1 }));
}

#[tokio::test]
async fn error_reply_rejects_with_the_server_reason() {
    let inner = inner();
    let (reference, rx) = inner.pending.register();

    route(
        &inner,
        &reply_frame(&reference, "error", json!({ "reason": "boom" })),
    );

    match rx.await.unwrap() {
        Err(ClientError::ServerRejected(reason)) => assert_eq!(reason, "boom"),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_reply_is_dropped_after_first_settles() {
    let inner = inner();
    let (reference, rx) = inner.pending.register();

    route(&inner, &reply_frame(&reference, "ok", json!({ "n": 1 })));
    route(&inner, &reply_frame(&reference, "error", json!("late")));

    // First outcome wins; the duplicate must not panic or resurrect
    assert!(rx.await.unwrap().is_ok());
    assert_eq!(inner.pending.len(), 0);
}

#[tokio::test]
async fn malformed_reply_payload_rejects_the_waiter() {
    let inner = inner();
    let (reference, rx) = inner.pending.register();

    let frame = Envelope {
        topic: "user:alice".to_string(),
        event: EVENT_REPLY.to_string(),
        payload: json!({ "status": "definitely-not-a-status" }),
        reference: Some(reference),
    }
    .to_json()
    .unwrap();
    route(&inner, &frame);

    assert!(matches!(
        rx.await.unwrap(),
        Err(ClientError::MalformedResponse(_))
    ));
}

#[test]
fn undecodable_frames_are_dropped_without_panic() {
    let inner = inner();
    route(&inner, "not json at all");
    route(&inner, "{\"topic\": 42}");
    route(&inner, "");
}

#[tokio::test]
async fn new_message_broadcast_bumps_counters_before_publish() {
    let inner = inner();
    let mut messages = inner.message_stream();

    route(&inner, &broadcast_frame("new_message", message_json("m-1")));

    let received = messages.recv().await.unwrap();
    assert_eq!(received.id, "m-1");
    assert_eq!(received.category, MessageCategory::Private);
    // Counters were already bumped when the message came out
    let counters = inner.counters();
    assert_eq!(counters.private, 1);
    assert_eq!(counters.total, 1);
}

#[tokio::test]
async fn status_change_broadcast_reaches_the_status_stream() {
    let inner = inner();
    let mut statuses = inner.status_stream();

    route(
        &inner,
        &broadcast_frame(
            "message_status_changed",
            json!({
                "conversation_id": "conv-1",
                "message_ids": ["m-1", "m-2"],
                "status": "read",
            }),
        ),
    );

    let change = statuses.recv().await.unwrap();
    assert_eq!(change.conversation_id, "conv-1");
    assert_eq!(change.message_ids, vec!["m-1", "m-2"]);
    assert_eq!(change.status, MessageStatus::Read);
}

#[tokio::test]
async fn unknown_broadcast_discriminator_goes_to_catchall() {
    let inner = inner();
    let mut catchall = inner.catchall_stream();

    route(
        &inner,
        &broadcast_frame("typing_indicator", json!({ "user_id": "bob" })),
    );

    let event = catchall.recv().await.unwrap();
    assert_eq!(event.topic, "user:alice");
    assert_eq!(event.event_type, "typing_indicator");
    assert_eq!(event.payload, json!({ "user_id": "bob" }));
}

#[tokio::test]
async fn malformed_new_message_is_dropped_not_delivered() {
    let inner = inner();
    let mut messages = inner.message_stream();

    route(
        &inner,
        &broadcast_frame("new_message", json!({ "id": 42 })),
    );

    assert!(messages.try_recv().is_err());
    assert_eq!(inner.counters().total, 0);
}

#[tokio::test]
async fn channel_error_marks_membership_stale_and_reports() {
    let inner = inner();
    inner
        .channels
        .record_joined("user:alice", "1", json!({ "token": "t" }));
    let mut errors = inner.error_stream();

    let frame = Envelope {
        topic: "user:alice".to_string(),
        event: EVENT_ERROR.to_string(),
        payload: json!({}),
        reference: None,
    }
    .to_json()
    .unwrap();
    route(&inner, &frame);

    assert!(!inner.channels.is_joined("user:alice"));
    // Membership survives as stale so a reconnect can replay it
    assert_eq!(inner.channels.stale().len(), 1);
    assert!(matches!(
        errors.recv().await.unwrap(),
        crate::error::ErrorEvent::Channel { .. }
    ));
}

#[test]
fn channel_error_for_unknown_topic_is_ignored() {
    let inner = inner();
    let frame = Envelope {
        topic: "user:stranger".to_string(),
        event: EVENT_ERROR.to_string(),
        payload: json!({}),
        reference: None,
    }
    .to_json()
    .unwrap();
    route(&inner, &frame);
    assert_eq!(inner.channels.stale().len(), 0);
}
