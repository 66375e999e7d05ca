// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection lifecycle and reconnection policy.
//!
//! A single supervisor task owns the transport. It connects, runs the I/O
//! loop, and on abnormal loss schedules reconnects with exponential backoff
//! (`min(base * 2^(attempt-1), cap)`). A normal closure, an explicit
//! disconnect, or exhausting the attempt budget ends the supervisor.
//!
//! The I/O loop is the only code that touches the socket: outbound frames
//! arrive on a per-connection queue, inbound frames go to the event router.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ErrorEvent};
use crate::router;
use crate::state::ClientInner;
use crate::transport::{FrameSink, FrameSource, Transport, TransportEvent};

/// Observable liveness of the connection. Exactly one value at a time;
/// transitions are the only way callers observe connection health.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected and not trying.
    Disconnected,
    /// A connection attempt is in flight.
    Connecting,
    /// Connected and serving traffic.
    Connected,
    /// Lost the connection; waiting out the backoff delay.
    Reconnecting { attempt: u32 },
    /// Reconnection gave up; manual `connect` required.
    Error,
}

/// Backoff delay before reconnect attempt `n` (1-based):
/// `min(base * 2^(n-1), cap)`.
pub fn backoff_delay(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(2u32.saturating_pow(exponent)).min(cap)
}

/// Supervisor task: owns the transport for the lifetime of a session.
pub(crate) async fn supervise(inner: Arc<ClientInner>, transport: Arc<dyn Transport>) {
    let mut attempt: u32 = 0;
    let mut keep_rx = inner.keep_stream();

    loop {
        if !inner.keep_connected() {
            inner.set_state(ConnectionState::Disconnected);
            return;
        }

        let Some(credentials) = inner.credentials() else {
            inner.set_state(ConnectionState::Disconnected);
            return;
        };

        inner.set_state(ConnectionState::Connecting);
        match transport
            .connect(&inner.config.url, &credentials.token)
            .await
        {
            Ok((sink, source)) => {
                attempt = 0;
                info!(url = %inner.config.url, "connected");
                let outbound_rx = inner.open_outbound();
                inner.set_state(ConnectionState::Connected);
                if let Some(outbound_tx) = inner.outbound_sender() {
                    inner
                        .heartbeat
                        .start(inner.config.heartbeat_interval, outbound_tx);
                }
                spawn_replay(&inner);

                let normal = io_loop(&inner, sink, source, outbound_rx, &mut keep_rx).await;

                inner.heartbeat.stop();
                inner.close_outbound();
                inner.channels.mark_all_stale();
                inner.pending.fail_all(|| ClientError::ConnectionClosed);

                if normal || !inner.keep_connected() {
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
                warn!("connection lost, scheduling reconnect");
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
            }
        }

        attempt += 1;
        if attempt > inner.config.max_reconnect_attempts {
            warn!(
                attempts = inner.config.max_reconnect_attempts,
                "reconnection budget exhausted"
            );
            inner.emit_error(ErrorEvent::MaxReconnectAttempts {
                attempts: inner.config.max_reconnect_attempts,
            });
            inner.set_state(ConnectionState::Error);
            return;
        }

        inner.set_state(ConnectionState::Reconnecting { attempt });
        let delay = backoff_delay(
            attempt,
            inner.config.reconnect_base_delay,
            inner.config.reconnect_max_delay,
        );
        debug!(attempt, ?delay, "backing off before reconnect");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = keep_rx.changed() => {}
        }
    }
}

/// Pumps frames in both directions until the connection ends.
///
/// Returns true when the session ended cleanly (normal closure or local
/// shutdown), false on abnormal loss.
async fn io_loop(
    inner: &ClientInner,
    mut sink: Box<dyn FrameSink>,
    mut source: Box<dyn FrameSource>,
    mut outbound_rx: mpsc::Receiver<String>,
    keep_rx: &mut watch::Receiver<bool>,
) -> bool {
    loop {
        if !inner.keep_connected() {
            let _ = sink.close().await;
            return true;
        }

        tokio::select! {
            _ = keep_rx.changed() => {
                // Checked at the top of the loop
            }
            maybe_frame = outbound_rx.recv() => {
                match maybe_frame {
                    Some(frame) => {
                        if let Err(e) = sink.send(frame).await {
                            warn!(error = %e, "send failed");
                            inner.emit_error(ErrorEvent::Transport {
                                message: e.to_string(),
                            });
                            return false;
                        }
                    }
                    None => {
                        // Outbound queue dropped: local teardown
                        let _ = sink.close().await;
                        return true;
                    }
                }
            }
            event = source.next() => {
                match event {
                    Ok(TransportEvent::Frame(text)) => router::route(inner, &text),
                    Ok(TransportEvent::Closed { normal }) => {
                        debug!(normal, "peer closed connection");
                        return normal;
                    }
                    Err(e) => {
                        warn!(error = %e, "receive failed");
                        inner.emit_error(ErrorEvent::Transport {
                            message: e.to_string(),
                        });
                        return false;
                    }
                }
            }
        }
    }
}

/// Replays joins for memberships that went stale across a reconnect.
///
/// Runs as its own task so the I/O loop is free to deliver the join
/// replies it waits on.
fn spawn_replay(inner: &Arc<ClientInner>) {
    let stale = inner.channels.stale();
    if stale.is_empty() {
        return;
    }
    let inner = Arc::clone(inner);
    tokio::spawn(async move {
        for (topic, auth_payload) in stale {
            match inner.join(&topic, auth_payload).await {
                Ok(()) => info!(topic = %topic, "channel rejoined"),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "channel replay failed");
                    inner.emit_error(ErrorEvent::Channel {
                        topic,
                        message: e.to_string(),
                    });
                }
            }
        }
    });
}
