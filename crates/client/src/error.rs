// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for chatlink client operations.

use thiserror::Error;

use crate::transport::TransportError;

/// Error type for operations on the chat client.
///
/// None of these conditions is escalated to a process-fatal fault; every
/// facade operation returns one of them to the caller instead.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Operation attempted with no live socket.
    #[error("not connected to chat server")]
    NotConnected,

    /// `connect` called while a session is already up or being established.
    #[error("already connected")]
    AlreadyConnected,

    /// Operation on a topic that was never joined.
    #[error("not joined to topic: {0}")]
    NotJoined(String),

    /// No reply arrived within the per-request deadline.
    #[error("request timed out")]
    RequestTimeout,

    /// The server answered with an error-status reply.
    #[error("server rejected request: {0}")]
    ServerRejected(String),

    /// A reply arrived but required fields were absent.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The connection closed while the request was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// Automatic reconnection gave up; a manual `connect` is required.
    #[error("max reconnect attempts ({0}) exceeded")]
    MaxReconnectAttempts(u32),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wire encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] chatlink_core::Error),
}

/// A specialized Result type for chat client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Background failure published on the error stream.
///
/// Reconnection, heartbeat, and channel-level failures are handled
/// internally and only surfaced here, never by panicking out of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorEvent {
    /// Reconnection gave up after the given number of attempts.
    MaxReconnectAttempts { attempts: u32 },
    /// The transport failed; the reconnection policy takes over.
    Transport { message: String },
    /// The server crashed or closed a joined channel.
    Channel { topic: String, message: String },
}
