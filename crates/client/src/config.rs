// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration for the chat client.

use std::time::Duration;

/// Configuration for the chat client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the chat server.
    pub url: String,
    /// Deadline for each correlated request.
    pub request_timeout: Duration,
    /// Interval between keepalive heartbeats.
    pub heartbeat_interval: Duration,
    /// Initial delay for exponential reconnect backoff.
    pub reconnect_base_delay: Duration,
    /// Cap on the reconnect backoff delay.
    pub reconnect_max_delay: Duration,
    /// Reconnect attempts before giving up and surfacing a terminal error.
    pub max_reconnect_attempts: u32,
    /// Whether joining the user channel starts the background sync loop.
    pub auto_sync: bool,
    /// Interval between background sync runs.
    pub sync_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            url: "ws://localhost:4000/socket/websocket".to_string(),
            request_timeout: Duration::from_secs(15),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_millis(2000),
            reconnect_max_delay: Duration::from_millis(30000),
            max_reconnect_attempts: 5,
            auto_sync: false,
            sync_interval: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    /// Config pointing at the given server URL, defaults otherwise.
    pub fn with_url(url: impl Into<String>) -> Self {
        ClientConfig {
            url: url.into(),
            ..ClientConfig::default()
        }
    }
}
