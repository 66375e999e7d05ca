// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared client state.
//!
//! One `ClientInner` is shared (via `Arc`) between the facade, the socket
//! supervisor, and the event router. It owns the pending-request registry,
//! the membership table, the subscriber streams, and the handle to the
//! current connection's outbound queue. The physical connection itself is
//! owned exclusively by the supervisor task; nothing here can write to the
//! socket except through the outbound queue.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::debug;

use chatlink_core::envelope::{Envelope, EVENT_JOIN, EVENT_LEAVE};
use chatlink_core::{ChatMessage, StatusChange, UnreadCounters};

use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorEvent, Result};
use crate::heartbeat::Heartbeat;
use crate::membership::MembershipTable;
use crate::pending::{PendingGuard, PendingRegistry};
use crate::socket::ConnectionState;

/// Capacity of the subscriber broadcast channels.
const STREAM_CAPACITY: usize = 1024;

/// Capacity of the per-connection outbound frame queue.
const OUTBOUND_CAPACITY: usize = 256;

/// Credentials captured at connect time.
#[derive(Debug, Clone)]
pub(crate) struct Credentials {
    pub token: String,
    pub user_id: String,
}

/// A server-pushed event with no dedicated typed stream.
///
/// Unknown `event_type` discriminators land here instead of being dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastEvent {
    pub topic: String,
    pub event_type: String,
    pub payload: Value,
}

pub(crate) struct ClientInner {
    pub(crate) config: ClientConfig,
    pub(crate) pending: PendingRegistry,
    pub(crate) channels: MembershipTable,
    pub(crate) heartbeat: Heartbeat,

    state_tx: watch::Sender<ConnectionState>,
    counters_tx: watch::Sender<UnreadCounters>,
    keep_tx: watch::Sender<bool>,
    credentials: Mutex<Option<Credentials>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    last_synced_at: Mutex<Option<chrono::DateTime<chrono::Utc>>>,

    message_tx: broadcast::Sender<ChatMessage>,
    status_tx: broadcast::Sender<StatusChange>,
    catchall_tx: broadcast::Sender<BroadcastEvent>,
    error_tx: broadcast::Sender<ErrorEvent>,
}

impl ClientInner {
    pub(crate) fn new(config: ClientConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (counters_tx, _) = watch::channel(UnreadCounters::default());
        let (keep_tx, _) = watch::channel(false);
        let (message_tx, _) = broadcast::channel(STREAM_CAPACITY);
        let (status_tx, _) = broadcast::channel(STREAM_CAPACITY);
        let (catchall_tx, _) = broadcast::channel(STREAM_CAPACITY);
        let (error_tx, _) = broadcast::channel(STREAM_CAPACITY);

        ClientInner {
            config,
            pending: PendingRegistry::new(),
            channels: MembershipTable::new(),
            heartbeat: Heartbeat::new(),
            state_tx,
            counters_tx,
            keep_tx,
            credentials: Mutex::new(None),
            outbound: Mutex::new(None),
            last_synced_at: Mutex::new(None),
            message_tx,
            status_tx,
            catchall_tx,
            error_tx,
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Connection state ────────────────────────────────────────────────

    pub(crate) fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(?previous, current = ?state, "connection state changed");
        }
    }

    pub(crate) fn state_stream(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub(crate) fn keep_connected(&self) -> bool {
        *self.keep_tx.borrow()
    }

    pub(crate) fn set_keep_connected(&self, keep: bool) {
        let _ = self.keep_tx.send_replace(keep);
    }

    pub(crate) fn keep_stream(&self) -> watch::Receiver<bool> {
        self.keep_tx.subscribe()
    }

    pub(crate) fn set_credentials(&self, token: String, user_id: String) {
        *Self::lock(&self.credentials) = Some(Credentials { token, user_id });
    }

    pub(crate) fn credentials(&self) -> Option<Credentials> {
        Self::lock(&self.credentials).clone()
    }

    // ─── Outbound frames ─────────────────────────────────────────────────

    /// Installs the outbound queue for a freshly opened connection.
    pub(crate) fn open_outbound(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        *Self::lock(&self.outbound) = Some(tx);
        rx
    }

    /// Drops the outbound queue when the connection goes away.
    pub(crate) fn close_outbound(&self) {
        *Self::lock(&self.outbound) = None;
    }

    pub(crate) fn outbound_sender(&self) -> Option<mpsc::Sender<String>> {
        Self::lock(&self.outbound).clone()
    }

    /// Queues a frame for the I/O worker without blocking the caller.
    pub(crate) fn send_frame(&self, frame: String) -> Result<()> {
        let tx = self.outbound_sender().ok_or(ClientError::NotConnected)?;
        tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => ClientError::NotConnected,
            mpsc::error::TrySendError::Full(_) => ClientError::Transport(
                crate::transport::TransportError::SendFailed("outbound queue full".into()),
            ),
        })
    }

    // ─── Correlated requests ─────────────────────────────────────────────

    /// Sends a request and awaits its correlated reply.
    ///
    /// Allocates a ref, registers a waiter, queues the frame, and suspends
    /// the calling task until the reply arrives or the deadline passes.
    /// The pending entry is removed on every exit path, including caller
    /// cancellation.
    pub(crate) async fn push(&self, topic: &str, event: &str, payload: Value) -> Result<Value> {
        self.push_with_ref(topic, event, payload)
            .await
            .map(|(_, response)| response)
    }

    pub(crate) async fn push_with_ref(
        &self,
        topic: &str,
        event: &str,
        payload: Value,
    ) -> Result<(String, Value)> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }

        let (reference, rx) = self.pending.register();
        let _guard = PendingGuard::new(&self.pending, reference.clone());

        let frame = Envelope::request(topic, event, payload, reference.clone()).to_json()?;
        self.send_frame(frame)?;

        match tokio::time::timeout(self.config.request_timeout, rx).await {
            Err(_elapsed) => Err(ClientError::RequestTimeout),
            Ok(Err(_dropped)) => Err(ClientError::ConnectionClosed),
            Ok(Ok(result)) => result.map(|response| (reference, response)),
        }
    }

    // ─── Channel membership ──────────────────────────────────────────────

    /// Joins a topic, carrying the auth payload in the join frame.
    ///
    /// A no-op success if the topic is already a live member: no second
    /// join frame is sent. Membership is recorded only after an ok reply.
    pub(crate) async fn join(&self, topic: &str, auth_payload: Value) -> Result<()> {
        if self.channels.is_joined(topic) {
            return Ok(());
        }
        let (join_ref, _response) = self
            .push_with_ref(topic, EVENT_JOIN, auth_payload.clone())
            .await?;
        self.channels.record_joined(topic, &join_ref, auth_payload);
        Ok(())
    }

    /// Leaves a topic the client previously joined.
    pub(crate) async fn leave(&self, topic: &str) -> Result<()> {
        if !self.channels.contains(topic) {
            return Err(ClientError::NotJoined(topic.to_string()));
        }
        let _ = self
            .push(topic, EVENT_LEAVE, Value::Object(serde_json::Map::new()))
            .await?;
        self.channels.remove(topic);
        Ok(())
    }

    // ─── Subscriber streams ──────────────────────────────────────────────

    pub(crate) fn counters(&self) -> UnreadCounters {
        *self.counters_tx.borrow()
    }

    pub(crate) fn counters_stream(&self) -> watch::Receiver<UnreadCounters> {
        self.counters_tx.subscribe()
    }

    /// Publishes an inbound message, bumping unread counters first so a
    /// subscriber that reads them right after delivery sees the increment.
    pub(crate) fn deliver_message(&self, message: ChatMessage) {
        self.counters_tx.send_modify(|c| c.bump(message.category));
        let _ = self.message_tx.send(message);
    }

    /// Publishes a message without touching unread counters (the caller's
    /// own outbound message echoed back to its subscribers).
    pub(crate) fn publish_message(&self, message: ChatMessage) {
        let _ = self.message_tx.send(message);
    }

    pub(crate) fn publish_status(&self, change: StatusChange) {
        let _ = self.status_tx.send(change);
    }

    pub(crate) fn publish_catchall(&self, event: BroadcastEvent) {
        let _ = self.catchall_tx.send(event);
    }

    pub(crate) fn emit_error(&self, event: ErrorEvent) {
        let _ = self.error_tx.send(event);
    }

    pub(crate) fn message_stream(&self) -> broadcast::Receiver<ChatMessage> {
        self.message_tx.subscribe()
    }

    pub(crate) fn status_stream(&self) -> broadcast::Receiver<StatusChange> {
        self.status_tx.subscribe()
    }

    pub(crate) fn catchall_stream(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.catchall_tx.subscribe()
    }

    pub(crate) fn error_stream(&self) -> broadcast::Receiver<ErrorEvent> {
        self.error_tx.subscribe()
    }

    // ─── Sync cursor ─────────────────────────────────────────────────────

    pub(crate) fn last_synced_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        *Self::lock(&self.last_synced_at)
    }

    pub(crate) fn note_synced(&self, ts: chrono::DateTime<chrono::Utc>) {
        let mut guard = Self::lock(&self.last_synced_at);
        if guard.map_or(true, |prev| ts > prev) {
            *guard = Some(ts);
        }
    }
}
