// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Chat domain types carried inside envelope payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broadcast discriminator for a newly delivered message.
pub const EVENT_TYPE_NEW_MESSAGE: &str = "new_message";
/// Broadcast discriminator for a message status change.
pub const EVENT_TYPE_STATUS_CHANGED: &str = "message_status_changed";

/// Category a message is counted under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum MessageCategory {
    #[default]
    #[serde(rename = "private_message")]
    Private,
    #[serde(rename = "group_message")]
    Group,
    #[serde(rename = "system_message")]
    System,
}

/// Delivery status of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
    Withdrawn,
}

/// A chat message as exchanged with the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: Option<String>,
    #[serde(default)]
    pub category: MessageCategory,
    pub content: String,
    #[serde(default)]
    pub status: MessageStatus,
    pub inserted_at: DateTime<Utc>,
    /// Idempotency id chosen by the sending client.
    #[serde(default)]
    pub client_id: Option<String>,
}

/// A conversation summary as returned by the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub participant_ids: Vec<String>,
    #[serde(default)]
    pub last_message: Option<ChatMessage>,
    #[serde(default)]
    pub unread_count: u64,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A server-pushed status change for one or more messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub conversation_id: String,
    #[serde(default)]
    pub message_ids: Vec<String>,
    pub status: MessageStatus,
}

/// Aggregate unread counts per message category.
///
/// Mutated only by the event router; read-only to subscribers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UnreadCounters {
    pub private: u64,
    pub group: u64,
    pub system: u64,
    pub total: u64,
}

impl UnreadCounters {
    /// Increments the counter for a category and the total.
    pub fn bump(&mut self, category: MessageCategory) {
        match category {
            MessageCategory::Private => self.private += 1,
            MessageCategory::Group => self.group += 1,
            MessageCategory::System => self.system += 1,
        }
        self.total += 1;
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
