// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope for the channel protocol.
//!
//! Every frame on the socket is a JSON object with four keys:
//! `{topic, event, payload, ref}`. `ref` is a client-generated correlation
//! id present on requests and echoed back on their replies; it is absent on
//! server-initiated broadcasts. Decoding tolerates missing optional fields
//! (`payload` defaults to an empty object, `ref` to None) so a sparse frame
//! never takes down the receive loop.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Topic used for protocol-level frames (heartbeats).
pub const TOPIC_PHOENIX: &str = "phoenix";

/// Channel join request.
pub const EVENT_JOIN: &str = "phx_join";
/// Channel leave request.
pub const EVENT_LEAVE: &str = "phx_leave";
/// Correlated reply to a request.
pub const EVENT_REPLY: &str = "phx_reply";
/// Server-side channel crash.
pub const EVENT_ERROR: &str = "phx_error";
/// Server-side channel close.
pub const EVENT_CLOSE: &str = "phx_close";
/// Connection keepalive.
pub const EVENT_HEARTBEAT: &str = "heartbeat";
/// Generic wrapper for server-pushed events; the payload carries the
/// `event_type` discriminator.
pub const EVENT_BROADCAST: &str = "broadcast";

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A single frame on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    /// Channel topic, e.g. `user:42`.
    pub topic: String,
    /// Event name, reserved (`phx_*`, `heartbeat`) or application-defined.
    pub event: String,
    /// Structured payload. Defaults to `{}` when absent.
    #[serde(default = "empty_payload")]
    pub payload: Value,
    /// Correlation id for request/reply pairs. None on broadcasts.
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

impl Envelope {
    /// Creates a request frame carrying a correlation ref.
    pub fn request(
        topic: impl Into<String>,
        event: impl Into<String>,
        payload: Value,
        reference: impl Into<String>,
    ) -> Self {
        Envelope {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference: Some(reference.into()),
        }
    }

    /// Creates a join request for a topic.
    ///
    /// The payload carries topic-level authorization (the bearer token).
    pub fn join(topic: impl Into<String>, payload: Value, reference: impl Into<String>) -> Self {
        Envelope::request(topic, EVENT_JOIN, payload, reference)
    }

    /// Creates a leave request for a topic.
    pub fn leave(topic: impl Into<String>, reference: impl Into<String>) -> Self {
        Envelope::request(topic, EVENT_LEAVE, empty_payload(), reference)
    }

    /// Creates a heartbeat frame.
    ///
    /// Heartbeats carry no ref; no reply is tracked for them.
    pub fn heartbeat() -> Self {
        Envelope {
            topic: TOPIC_PHOENIX.to_string(),
            event: EVENT_HEARTBEAT.to_string(),
            payload: empty_payload(),
            reference: None,
        }
    }

    /// Whether this frame is a correlated reply.
    pub fn is_reply(&self) -> bool {
        self.event == EVENT_REPLY
    }

    /// Serializes the envelope to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserializes an envelope from JSON.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

/// Status carried inside a reply payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// Inner shape of a `phx_reply` payload: `{status, response}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Reply {
    pub status: ReplyStatus,
    /// Response body. Defaults to `{}` when absent.
    #[serde(default = "empty_payload")]
    pub response: Value,
}

impl Reply {
    /// Extracts a reply from an envelope payload.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        serde_json::from_value(payload.clone())
            .map_err(|e| Error::InvalidReply(e.to_string()))
    }

    /// Human-readable rejection reason for error replies.
    ///
    /// Servers put the reason under `response.reason`; fall back to the raw
    /// response so the caller always gets something to show.
    pub fn reason(&self) -> String {
        match self.response.get("reason").and_then(Value::as_str) {
            Some(reason) => reason.to_string(),
            None => match self.response.as_str() {
                Some(s) => s.to_string(),
                None => self.response.to_string(),
            },
        }
    }
}

/// Inner shape of a `broadcast` payload: `{event_type, payload}`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Broadcast {
    /// Application-level discriminator, e.g. `new_message`.
    pub event_type: String,
    /// Event body. Defaults to `{}` when absent.
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

impl Broadcast {
    /// Extracts a broadcast wrapper from an envelope payload.
    pub fn from_payload(payload: &Value) -> Result<Self> {
        serde_json::from_value(payload.clone())
            .map_err(|e| Error::InvalidBroadcast(e.to_string()))
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
