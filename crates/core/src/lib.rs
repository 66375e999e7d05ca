// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chatlink-core: Shared wire and domain types for the chatlink client.
//!
//! This crate provides the channel wire envelope, the reserved event names,
//! and the chat domain types (messages, conversations, unread counters)
//! exchanged over the realtime socket.

pub mod envelope;
pub mod error;
pub mod message;

pub use envelope::{Broadcast, Envelope, Reply, ReplyStatus};
pub use error::{Error, Result};
pub use message::{
    ChatMessage, Conversation, MessageCategory, MessageStatus, StatusChange, UnreadCounters,
};
