// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operation facade: the typed public API of the chat client.
//!
//! Every operation follows the same template: verify membership in the
//! required topic, build a payload, delegate to the correlated `push`
//! primitive, and map the raw response into a typed domain result. The
//! client never retries an operation on its own; only the connection is
//! retried.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use chatlink_core::{ChatMessage, Conversation, MessageCategory, StatusChange, UnreadCounters};

use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorEvent, Result};
use crate::socket::{self, ConnectionState};
use crate::state::{BroadcastEvent, ClientInner};
use crate::transport::{Transport, WebSocketTransport};

/// Application events understood by the chat server.
const EVENT_SEND_MESSAGE: &str = "send_message";
const EVENT_WITHDRAW_MESSAGE: &str = "withdraw_message";
const EVENT_MARK_READ: &str = "mark_read";
const EVENT_SYNC_MESSAGES: &str = "sync_messages";
const EVENT_HISTORY: &str = "history";
const EVENT_CREATE_CONVERSATION: &str = "create_conversation";
const EVENT_GET_CONVERSATION: &str = "get_conversation";
const EVENT_LIST_CONVERSATIONS: &str = "list_conversations";
const EVENT_CLEAR_CONVERSATION: &str = "clear_conversation";

/// Parameters for [`ChatClient::send_message`].
#[derive(Debug, Clone)]
pub struct SendMessageRequest {
    pub receiver_id: String,
    pub content: String,
    pub category: MessageCategory,
    /// Existing conversation to post into; the server creates one if None.
    pub conversation_id: Option<String>,
}

impl SendMessageRequest {
    /// A private message to a single receiver.
    pub fn private(receiver_id: impl Into<String>, content: impl Into<String>) -> Self {
        SendMessageRequest {
            receiver_id: receiver_id.into(),
            content: content.into(),
            category: MessageCategory::Private,
            conversation_id: None,
        }
    }
}

/// Realtime chat client.
///
/// One instance owns one physical connection; share it across tasks by
/// constructing it once and handing out clones of an `Arc`. All operations
/// take `&self` and are safe to call concurrently.
pub struct ChatClient {
    inner: Arc<ClientInner>,
    transport: Arc<dyn Transport>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    auto_sync: Mutex<Option<JoinHandle<()>>>,
}

impl ChatClient {
    /// Creates a client using the real WebSocket transport.
    pub fn new(config: ClientConfig) -> Self {
        ChatClient::with_transport(config, Arc::new(WebSocketTransport::new()))
    }

    /// Creates a client with a custom transport (for testing).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        ChatClient {
            inner: Arc::new(ClientInner::new(config)),
            transport,
            supervisor: Mutex::new(None),
            auto_sync: Mutex::new(None),
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─── Connection ──────────────────────────────────────────────────────

    /// Starts a session with the given bearer token and user id.
    ///
    /// Refuses if a session is already up or being established. Returns as
    /// soon as the connection supervisor is running; observe progress on
    /// [`ChatClient::state_stream`] or await [`ChatClient::wait_connected`].
    pub fn connect(&self, token: impl Into<String>, user_id: impl Into<String>) -> Result<()> {
        // State check, claim, and spawn happen under one lock so a second
        // connect cannot slip in before the supervisor task is polled.
        let mut supervisor = Self::lock(&self.supervisor);
        match self.inner.state() {
            ConnectionState::Disconnected | ConnectionState::Error => {}
            _ => return Err(ClientError::AlreadyConnected),
        }

        self.inner.set_credentials(token.into(), user_id.into());
        self.inner.set_keep_connected(true);
        self.inner.set_state(ConnectionState::Connecting);
        *supervisor = Some(tokio::spawn(socket::supervise(
            Arc::clone(&self.inner),
            Arc::clone(&self.transport),
        )));
        Ok(())
    }

    /// Waits until the session is connected.
    ///
    /// Fails once reconnection gives up or the session is torn down.
    pub async fn wait_connected(&self) -> Result<()> {
        let mut rx = self.inner.state_stream();
        loop {
            match *rx.borrow_and_update() {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Error => {
                    return Err(ClientError::MaxReconnectAttempts(
                        self.inner.config.max_reconnect_attempts,
                    ));
                }
                _ => {}
            }
            if rx.changed().await.is_err() {
                return Err(ClientError::ConnectionClosed);
            }
        }
    }

    /// Tears the session down.
    ///
    /// Closes the transport with a normal closure, cancels every timer,
    /// clears channel memberships, and rejects all pending requests with a
    /// connection-closed error. Terminal for this session; a new `connect`
    /// starts fresh.
    pub async fn disconnect(&self) {
        self.stop_auto_sync();
        self.inner.set_keep_connected(false);
        if let Some(handle) = Self::lock(&self.supervisor).take() {
            let _ = handle.await;
        }
        self.inner.heartbeat.stop();
        self.inner.channels.clear();
        self.inner.pending.fail_all(|| ClientError::ConnectionClosed);
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    // ─── Channel membership ──────────────────────────────────────────────

    /// Joins the current user's channel (`user:<id>`).
    ///
    /// A no-op if already joined. The join frame carries the bearer token
    /// for topic-level authorization. Starts the background sync loop when
    /// the config enables it.
    pub async fn join_user_channel(&self) -> Result<()> {
        let credentials = self.inner.credentials().ok_or(ClientError::NotConnected)?;
        let topic = user_topic(&credentials.user_id);
        self.inner
            .join(&topic, json!({ "token": credentials.token }))
            .await?;
        if self.inner.config.auto_sync {
            self.start_auto_sync();
        }
        Ok(())
    }

    /// Leaves the current user's channel.
    pub async fn leave_user_channel(&self) -> Result<()> {
        self.stop_auto_sync();
        let credentials = self.inner.credentials().ok_or(ClientError::NotConnected)?;
        self.inner.leave(&user_topic(&credentials.user_id)).await
    }

    fn require_joined(&self) -> Result<String> {
        let credentials = self.inner.credentials().ok_or(ClientError::NotConnected)?;
        let topic = user_topic(&credentials.user_id);
        if !self.inner.channels.is_joined(&topic) {
            return Err(ClientError::NotJoined(topic));
        }
        Ok(topic)
    }

    // ─── Messaging operations ────────────────────────────────────────────

    /// Sends a chat message.
    ///
    /// Attaches a client-generated idempotency id and client timestamp. On
    /// success the resulting message is republished on the message stream
    /// so the sender's own subscribers update without waiting for an echo
    /// broadcast.
    pub async fn send_message(&self, request: SendMessageRequest) -> Result<ChatMessage> {
        let topic = self.require_joined()?;
        let payload = json!({
            "client_id": Uuid::new_v4().to_string(),
            "client_ts": Utc::now(),
            "receiver_id": request.receiver_id,
            "conversation_id": request.conversation_id,
            "content": request.content,
            "category": request.category,
        });
        let response = self.inner.push(&topic, EVENT_SEND_MESSAGE, payload).await?;
        let message: ChatMessage = field(&response, "message")?;
        self.inner.publish_message(message.clone());
        Ok(message)
    }

    /// Withdraws (recalls) a previously sent message.
    pub async fn withdraw_message(&self, message_id: &str) -> Result<()> {
        let topic = self.require_joined()?;
        let payload = json!({ "message_id": message_id });
        self.inner
            .push(&topic, EVENT_WITHDRAW_MESSAGE, payload)
            .await?;
        Ok(())
    }

    /// Marks messages in a conversation as read.
    pub async fn mark_messages_read(
        &self,
        conversation_id: &str,
        message_ids: &[String],
    ) -> Result<()> {
        let topic = self.require_joined()?;
        let payload = json!({
            "conversation_id": conversation_id,
            "message_ids": message_ids,
        });
        self.inner.push(&topic, EVENT_MARK_READ, payload).await?;
        Ok(())
    }

    /// Fetches messages the client missed, optionally since a cursor.
    pub async fn sync_messages(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>> {
        let topic = self.require_joined()?;
        sync_messages_since(&self.inner, &topic, since).await
    }

    /// Fetches a page of a conversation's history.
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
        before: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let topic = self.require_joined()?;
        let payload = json!({
            "conversation_id": conversation_id,
            "before": before,
            "limit": limit,
        });
        let response = self.inner.push(&topic, EVENT_HISTORY, payload).await?;
        field(&response, "messages")
    }

    /// Creates a conversation with the given participants.
    pub async fn create_conversation(
        &self,
        participant_ids: &[String],
    ) -> Result<Conversation> {
        let topic = self.require_joined()?;
        let payload = json!({ "participant_ids": participant_ids });
        let response = self
            .inner
            .push(&topic, EVENT_CREATE_CONVERSATION, payload)
            .await?;
        field(&response, "conversation")
    }

    /// Fetches a single conversation by id.
    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        let topic = self.require_joined()?;
        let payload = json!({ "conversation_id": conversation_id });
        let response = self
            .inner
            .push(&topic, EVENT_GET_CONVERSATION, payload)
            .await?;
        field(&response, "conversation")
    }

    /// Lists the most recent conversations.
    pub async fn get_conversations(&self, limit: u32) -> Result<Vec<Conversation>> {
        let topic = self.require_joined()?;
        let payload = json!({ "limit": limit });
        let response = self
            .inner
            .push(&topic, EVENT_LIST_CONVERSATIONS, payload)
            .await?;
        field(&response, "conversations")
    }

    /// Clears a conversation's messages for this user.
    pub async fn clear_conversation(&self, conversation_id: &str) -> Result<()> {
        let topic = self.require_joined()?;
        let payload = json!({ "conversation_id": conversation_id });
        self.inner
            .push(&topic, EVENT_CLEAR_CONVERSATION, payload)
            .await?;
        Ok(())
    }

    // ─── Background sync ─────────────────────────────────────────────────

    /// Starts the background sync loop.
    ///
    /// Syncs once immediately, then on every interval tick. Failures are
    /// logged and swallowed; sync is best-effort and never surfaces an
    /// error to callers. Idempotent: a running loop is replaced.
    pub fn start_auto_sync(&self) {
        let mut guard = Self::lock(&self.auto_sync);
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        let inner = Arc::clone(&self.inner);
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.sync_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately: one sync right away
                ticker.tick().await;
                match auto_sync_once(&inner).await {
                    Ok(count) => debug!(messages = count, "background sync completed"),
                    Err(e) => warn!(error = %e, "background sync failed"),
                }
            }
        }));
    }

    /// Stops the background sync loop if one is running.
    pub fn stop_auto_sync(&self) {
        if let Some(handle) = Self::lock(&self.auto_sync).take() {
            handle.abort();
        }
    }

    // ─── Observable streams ──────────────────────────────────────────────

    /// Connection-state transitions.
    pub fn state_stream(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_stream()
    }

    /// Current unread counters.
    pub fn unread(&self) -> UnreadCounters {
        self.inner.counters()
    }

    /// Unread-counter updates.
    pub fn unread_stream(&self) -> watch::Receiver<UnreadCounters> {
        self.inner.counters_stream()
    }

    /// Inbound (and own outbound) chat messages.
    pub fn messages(&self) -> broadcast::Receiver<ChatMessage> {
        self.inner.message_stream()
    }

    /// Message status changes.
    pub fn status_changes(&self) -> broadcast::Receiver<StatusChange> {
        self.inner.status_stream()
    }

    /// Server-pushed events with no dedicated stream.
    pub fn broadcasts(&self) -> broadcast::Receiver<BroadcastEvent> {
        self.inner.catchall_stream()
    }

    /// Background failures (reconnection, transport, channel crashes).
    pub fn errors(&self) -> broadcast::Receiver<ErrorEvent> {
        self.inner.error_stream()
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        if let Some(handle) = Self::lock(&self.auto_sync).take() {
            handle.abort();
        }
        if let Some(handle) = Self::lock(&self.supervisor).take() {
            handle.abort();
        }
        self.inner.heartbeat.stop();
    }
}

/// Topic of a user's personal channel.
fn user_topic(user_id: &str) -> String {
    format!("user:{user_id}")
}

/// Extracts and deserializes a required field from a reply response.
fn field<T: DeserializeOwned>(response: &Value, key: &str) -> Result<T> {
    let value = response
        .get(key)
        .ok_or_else(|| ClientError::MalformedResponse(format!("missing field `{key}`")))?;
    serde_json::from_value(value.clone()).map_err(|e| ClientError::MalformedResponse(e.to_string()))
}

/// One best-effort sync pass for the background loop.
async fn auto_sync_once(inner: &Arc<ClientInner>) -> Result<usize> {
    let credentials = inner.credentials().ok_or(ClientError::NotConnected)?;
    let topic = user_topic(&credentials.user_id);
    if !inner.channels.is_joined(&topic) {
        return Err(ClientError::NotJoined(topic));
    }
    let since = inner.last_synced_at();
    let messages = sync_messages_since(inner, &topic, since).await?;
    Ok(messages.len())
}

async fn sync_messages_since(
    inner: &ClientInner,
    topic: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<ChatMessage>> {
    let payload = json!({ "since": since });
    let response = inner.push(topic, EVENT_SYNC_MESSAGES, payload).await?;
    let messages: Vec<ChatMessage> = field(&response, "messages")?;
    if let Some(latest) = messages.iter().map(|m| m.inserted_at).max() {
        inner.note_synced(latest);
    }
    Ok(messages)
}
