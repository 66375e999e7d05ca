// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! chatlink: persistent realtime messaging client.
//!
//! Maintains a single long-lived WebSocket connection shared by many
//! concurrent callers and speaks a channel protocol on top of it: topic
//! joins, correlated request/reply, heartbeats, and server-pushed events.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────┐   push    ┌──────────┐  register  ┌──────────┐
//! │ ChatClient │──────────►│ pending  │◄───────────│  router  │
//! │  (facade)  │           │ registry │   resolve  └──────────┘
//! └────────────┘           └──────────┘                  ▲
//!       │ join/leave                                     │ frames
//!       ▼                                                │
//! ┌────────────┐           ┌──────────────────────────────────┐
//! │ membership │◄──replay──│ socket supervisor (reconnect,    │
//! │   table    │           │ backoff, heartbeat, I/O loop)    │
//! └────────────┘           └──────────────────────────────────┘
//! ```
//!
//! # Features
//!
//! - Exactly-once correlated replies via a pending-request registry
//! - Automatic reconnect with exponential backoff and join replay
//! - Heartbeat keepalive while connected
//! - Typed event streams: messages, status changes, unread counters,
//!   connection state, background errors
//! - Injectable transport trait for testing

mod client;
mod config;
mod error;
mod heartbeat;
mod membership;
mod pending;
mod router;
mod socket;
mod state;
mod transport;

pub use client::{ChatClient, SendMessageRequest};
pub use config::ClientConfig;
pub use error::{ClientError, ErrorEvent, Result};
pub use socket::{backoff_delay, ConnectionState};
pub use state::BroadcastEvent;
pub use transport::{
    FrameSink, FrameSource, Transport, TransportError, TransportEvent, WebSocketTransport,
};

pub use chatlink_core as core;

#[cfg(test)]
mod client_tests;




#[cfg(test)]
mod router_tests;
