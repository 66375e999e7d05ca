// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-request registry.
//!
//! Maps a request correlation ref to a waiting caller. Refs come from a
//! monotonically increasing counter and are never reused while pending.
//! Exactly one of resolve/reject/cancel takes effect per ref: the waiter is
//! removed from the map before its oneshot fires, so later calls for the
//! same ref are no-ops.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ClientError;

type Waiter = oneshot::Sender<Result<Value, ClientError>>;

/// Registry of requests awaiting their correlated reply.
#[derive(Debug, Default)]
pub(crate) struct PendingRegistry {
    next_ref: AtomicU64,
    waiters: Mutex<HashMap<String, Waiter>>,
}

impl PendingRegistry {
    pub(crate) fn new() -> Self {
        PendingRegistry::default()
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<String, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates the next correlation ref without registering a waiter.
    ///
    /// Used for frames that carry a ref but track no reply (joins replayed
    /// in the background still register; heartbeats do not).
    pub(crate) fn next_ref(&self) -> String {
        self.next_ref.fetch_add(1, Ordering::Relaxed).to_string()
    }

    /// Registers a waiter under a fresh ref.
    pub(crate) fn register(&self) -> (String, oneshot::Receiver<Result<Value, ClientError>>) {
        let reference = self.next_ref();
        let (tx, rx) = oneshot::channel();
        self.waiters().insert(reference.clone(), tx);
        (reference, rx)
    }

    /// Resolves a pending ref with a successful response body.
    ///
    /// Returns false if the ref was unknown or already settled.
    pub(crate) fn resolve(&self, reference: &str, value: Value) -> bool {
        match self.waiters().remove(reference) {
            Some(tx) => tx.send(Ok(value)).is_ok(),
            None => false,
        }
    }

    /// Fails a pending ref with an error.
    pub(crate) fn reject(&self, reference: &str, err: ClientError) -> bool {
        match self.waiters().remove(reference) {
            Some(tx) => tx.send(Err(err)).is_ok(),
            None => false,
        }
    }

    /// Removes a waiter without notifying it.
    ///
    /// Covers both caller cancellation and timeout expiry; the caller side
    /// already knows the outcome in either case.
    pub(crate) fn cancel(&self, reference: &str) -> bool {
        self.waiters().remove(reference).is_some()
    }

    /// Fails every pending request.
    ///
    /// Used when the connection drops so no caller hangs past it.
    pub(crate) fn fail_all(&self, err: impl Fn() -> ClientError) {
        let drained: Vec<Waiter> = {
            let mut waiters = self.waiters();
            waiters.drain().map(|(_, tx)| tx).collect()
        };
        for tx in drained {
            let _ = tx.send(Err(err()));
        }
    }

    /// Number of requests currently pending.
    pub(crate) fn len(&self) -> usize {
        self.waiters().len()
    }
}

/// Removes a registered waiter when the awaiting caller goes away.
///
/// Dropped on every exit path of `push`; after a normal resolution the
/// entry is already gone and the removal is a no-op.
pub(crate) struct PendingGuard<'a> {
    registry: &'a PendingRegistry,
    reference: String,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(registry: &'a PendingRegistry, reference: String) -> Self {
        PendingGuard {
            registry,
            reference,
        }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.registry.cancel(&self.reference);
    }
}
