// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use serde_json::json;
use uuid::Uuid;

use chatlink_core::envelope::{Envelope, EVENT_JOIN, EVENT_REPLY};
use chatlink_core::MessageCategory;

use crate::client::{ChatClient, SendMessageRequest};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::socket::ConnectionState;
use crate::transport_tests::{error_responder, responder_with, MockSession, MockTransport};

async fn connected_client(transport: Arc<MockTransport>) -> ChatClient {
    connected_client_with(transport, ClientConfig::default()).await
}

async fn connected_client_with(
    transport: Arc<MockTransport>,
    config: ClientConfig,
) -> ChatClient {
    let client = ChatClient::with_transport(config, transport);
    client.connect("token-1", "alice").unwrap();
    client.wait_connected().await.unwrap();
    client
}

// Polls with a short sleep so a paused clock still advances past timers.
async fn wait_for_event(session: &MockSession, event: &str) -> Envelope {
    loop {
        if let Some(envelope) = session
            .sent_envelopes()
            .into_iter()
            .find(|e| e.event == event)
        {
            return envelope;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

fn message_response(id: &str, inserted_at: &str) -> serde_json::Value {
    json!({
        "id": id,
        "conversation_id": "conv-1",
        "sender_id": "alice",
        "receiver_id": "bob",
        "content": "hello",
        "inserted_at": inserted_at,
    })
}

#[tokio::test]
async fn connect_twice_is_refused() {
    let transport = MockTransport::answering();
    let client = connected_client(transport).await;
    assert!(matches!(
        client.connect("token-1", "alice"),
        Err(ClientError::AlreadyConnected)
    ));
}

#[tokio::test]
async fn back_to_back_connects_open_a_single_session() {
    let transport = MockTransport::answering();
    let client = ChatClient::with_transport(ClientConfig::default(), transport.clone());

    // The second call lands before the supervisor task is ever polled;
    // it must still be refused so only one connection can exist.
    let first = client.connect("token-1", "alice");
    let second = client.connect("token-2", "alice");
    assert!(first.is_ok());
    assert!(matches!(second, Err(ClientError::AlreadyConnected)));

    client.wait_connected().await.unwrap();
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.tokens(), vec!["token-1"]);
}

#[tokio::test]
async fn operations_require_a_joined_channel() {
    let transport = MockTransport::answering();
    let client = connected_client(transport).await;

    let result = client
        .send_message(SendMessageRequest::private("bob", "hi"))
        .await;
    assert!(matches!(result, Err(ClientError::NotJoined(topic)) if topic == "user:alice"));

    let result = client.get_conversations(10).await;
    assert!(matches!(result, Err(ClientError::NotJoined(_))));
}

#[tokio::test]
async fn operations_require_credentials() {
    let transport = MockTransport::answering();
    let client = ChatClient::with_transport(ClientConfig::default(), transport);
    let result = client
        .send_message(SendMessageRequest::private("bob", "hi"))
        .await;
    assert!(matches!(result, Err(ClientError::NotConnected)));
}

#[tokio::test]
async fn join_is_idempotent_on_the_wire() {
    let transport = MockTransport::answering();
    let client = connected_client(transport.clone()).await;

    client.join_user_channel().await.unwrap();
    client.join_user_channel().await.unwrap();

    let joins: Vec<Envelope> = transport
        .session(0)
        .sent_envelopes()
        .into_iter()
        .filter(|e| e.event == EVENT_JOIN)
        .collect();
    assert_eq!(joins.len(), 1);
    assert_eq!(joins[0].topic, "user:alice");
    // The join frame carries the bearer token for topic authorization
    assert_eq!(joins[0].payload, json!({ "token": "token-1" }));
}

#[tokio::test]
async fn send_message_attaches_client_id_and_republishes() {
    let transport = MockTransport::new();
    transport.set_responder(responder_with(|envelope| {
        if envelope.event == "send_message" {
            json!({ "message": message_response("m-1", "2026-08-30T12:00:00Z") })
        } else {
            json!({})
        }
    }));
    let client = connected_client(transport.clone()).await;
    client.join_user_channel().await.unwrap();
    let mut messages = client.messages();
    let counters_before = client.unread();

    let sent = client
        .send_message(SendMessageRequest::private("bob", "hello"))
        .await
        .unwrap();
    assert_eq!(sent.id, "m-1");
    assert_eq!(sent.category, MessageCategory::Private);

    // The caller's own message shows up on the stream without an echo
    let republished = messages.recv().await.unwrap();
    assert_eq!(republished.id, "m-1");
    // and does not count as unread
    assert_eq!(client.unread(), counters_before);

    let request = wait_for_event(&transport.session(0), "send_message").await;
    let client_id = request.payload["client_id"].as_str().unwrap();
    assert!(Uuid::parse_str(client_id).is_ok());
    assert!(request.payload["client_ts"].is_string());
    assert_eq!(request.payload["receiver_id"], "bob");
}

#[tokio::test]
async fn server_rejection_surfaces_the_reason() {
    let transport = MockTransport::answering();
    let client = connected_client(transport.clone()).await;
    client.join_user_channel().await.unwrap();

    transport.set_responder(error_responder("boom"));
    let result = client.withdraw_message("m-1").await;
    assert!(matches!(result, Err(ClientError::ServerRejected(reason)) if reason == "boom"));
}

#[tokio::test(start_paused = true)]
async fn unanswered_request_times_out() {
    // Answer the join, swallow everything else
    let transport = MockTransport::new();
    transport.set_responder(Arc::new(|envelope: &Envelope| {
        let reference = envelope.reference.clone()?;
        if envelope.event != EVENT_JOIN {
            return None;
        }
        Some(Envelope {
            topic: envelope.topic.clone(),
            event: EVENT_REPLY.to_string(),
            payload: json!({ "status": "ok", "response": {} }),
            reference: Some(reference),
        })
    }));
    let client = connected_client(transport).await;
    client.join_user_channel().await.unwrap();

    // The paused clock advances straight to the request deadline
    let result = client.withdraw_message("m-1").await;
    assert!(matches!(result, Err(ClientError::RequestTimeout)));
}

#[tokio::test]
async fn missing_response_field_is_a_malformed_response() {
    let transport = MockTransport::answering();
    let client = connected_client(transport).await;
    client.join_user_channel().await.unwrap();

    // The ok responder replies with an empty object, no "message" field
    let result = client
        .send_message(SendMessageRequest::private("bob", "hi"))
        .await;
    assert!(matches!(result, Err(ClientError::MalformedResponse(_))));
}

#[tokio::test]
async fn disconnect_rejects_in_flight_requests_and_closes_cleanly() {
    // Answer joins, swallow everything else
    let transport = MockTransport::new();
    transport.set_responder(Arc::new(|envelope: &Envelope| {
        let reference = envelope.reference.clone()?;
        if envelope.event != EVENT_JOIN {
            return None;
        }
        Some(Envelope {
            topic: envelope.topic.clone(),
            event: EVENT_REPLY.to_string(),
            payload: json!({ "status": "ok", "response": {} }),
            reference: Some(reference),
        })
    }));
    let client = Arc::new(connected_client(transport.clone()).await);
    client.join_user_channel().await.unwrap();

    let pending = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.withdraw_message("m-1").await })
    };
    wait_for_event(&transport.session(0), "withdraw_message").await;

    client.disconnect().await;

    assert!(matches!(
        pending.await.unwrap(),
        Err(ClientError::ConnectionClosed)
    ));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(transport.session(0).closed_by_client());
}

#[tokio::test(start_paused = true)]
async fn channel_is_rejoined_after_reconnect() {
    let transport = MockTransport::answering();
    let client = connected_client(transport.clone()).await;
    client.join_user_channel().await.unwrap();

    transport.session(0).close_from_server(false);
    let second = transport.wait_for_sessions(2).await;

    let replayed = wait_for_event(&second, EVENT_JOIN).await;
    assert_eq!(replayed.topic, "user:alice");
    assert_eq!(replayed.payload, json!({ "token": "token-1" }));
}

#[tokio::test]
async fn conversations_round_trip_through_typed_results() {
    let transport = MockTransport::new();
    transport.set_responder(responder_with(|envelope| match envelope.event.as_str() {
        "create_conversation" | "get_conversation" => json!({
            "conversation": {
                "id": "conv-9",
                "participant_ids": ["alice", "bob"],
                "unread_count": 0,
            }
        }),
        "list_conversations" => json!({
            "conversations": [
                { "id": "conv-9", "participant_ids": ["alice", "bob"] },
                { "id": "conv-10", "participant_ids": ["alice", "carol"] },
            ]
        }),
        _ => json!({}),
    }));
    let client = connected_client(transport).await;
    client.join_user_channel().await.unwrap();

    let created = client
        .create_conversation(&["alice".to_string(), "bob".to_string()])
        .await
        .unwrap();
    assert_eq!(created.id, "conv-9");
    assert_eq!(created.participant_ids, vec!["alice", "bob"]);

    let listed = client.get_conversations(10).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[1].id, "conv-10");
}

#[tokio::test(start_paused = true)]
async fn auto_sync_starts_from_scratch_then_uses_the_cursor() {
    let transport = MockTransport::new();
    transport.set_responder(responder_with(|envelope| {
        if envelope.event == "sync_messages" {
            json!({ "messages": [message_response("m-7", "2026-08-30T09:30:00Z")] })
        } else {
            json!({})
        }
    }));
    let config = ClientConfig {
        auto_sync: true,
        sync_interval: Duration::from_secs(60),
        ..ClientConfig::default()
    };
    let client = connected_client_with(transport.clone(), config).await;
    client.join_user_channel().await.unwrap();

    // First sync fires immediately with no cursor
    let session = transport.session(0);
    let first = wait_for_event(&session, "sync_messages").await;
    assert_eq!(first.payload["since"], serde_json::Value::Null);

    // Let the first reply land before the next tick
    tokio::task::yield_now().await;
    tokio::time::sleep(Duration::from_secs(61)).await;
    loop {
        let syncs: Vec<Envelope> = session
            .sent_envelopes()
            .into_iter()
            .filter(|e| e.event == "sync_messages")
            .collect();
        if syncs.len() >= 2 {
            let since = syncs[1].payload["since"].as_str().unwrap().to_string();
            let since = DateTime::parse_from_rfc3339(&since).unwrap();
            let expected = DateTime::parse_from_rfc3339("2026-08-30T09:30:00Z").unwrap();
            assert_eq!(since, expected);
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    client.stop_auto_sync();
}

#[tokio::test]
async fn manual_sync_returns_the_fetched_messages() {
    let transport = MockTransport::new();
    transport.set_responder(responder_with(|envelope| {
        if envelope.event == "sync_messages" {
            json!({ "messages": [
                message_response("m-1", "2026-08-30T08:00:00Z"),
                message_response("m-2", "2026-08-30T08:05:00Z"),
            ] })
        } else {
            json!({})
        }
    }));
    let client = connected_client(transport).await;
    client.join_user_channel().await.unwrap();

    let messages = client.sync_messages(None).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].id, "m-2");
}

#[tokio::test]
async fn leave_then_operate_fails_fast() {
    let transport = MockTransport::answering();
    let client = connected_client(transport).await;
    client.join_user_channel().await.unwrap();
    client.leave_user_channel().await.unwrap();

    let result = client.clear_conversation("conv-1").await;
    assert!(matches!(result, Err(ClientError::NotJoined(_))));
}
