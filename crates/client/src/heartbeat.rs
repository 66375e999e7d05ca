// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat driver.
//!
//! While connected, emits a protocol heartbeat frame on a fixed interval so
//! intermediaries keep the connection open and silent death is detected by
//! the server. At most one heartbeat task exists per client: starting again
//! cancels the previous task first, and stop is deterministic.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use chatlink_core::envelope::Envelope;

/// Owns the single heartbeat task for a client.
#[derive(Debug, Default)]
pub(crate) struct Heartbeat {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    pub(crate) fn new() -> Self {
        Heartbeat::default()
    }

    fn handle(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts the heartbeat loop on the given outbound queue.
    ///
    /// Idempotent: a running task is cancelled before the new one starts.
    /// The first beat fires one full interval after start.
    pub(crate) fn start(&self, interval: Duration, outbound: mpsc::Sender<String>) {
        let mut guard = self.handle();
        if let Some(previous) = guard.take() {
            previous.abort();
        }
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The interval's first tick completes immediately; skip it so
            // the first beat lands a full interval after connect.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Ok(frame) = Envelope::heartbeat().to_json() else {
                    continue;
                };
                if outbound.send(frame).await.is_err() {
                    // Connection torn down under us
                    break;
                }
                trace!("heartbeat sent");
            }
        }));
    }

    /// Stops the heartbeat loop if one is running.
    pub(crate) fn stop(&self) {
        if let Some(handle) = self.handle().take() {
            handle.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn is_running(&self) -> bool {
        self.handle()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.stop();
    }
}
