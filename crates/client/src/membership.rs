// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Channel membership tracking.
//!
//! Records which topics this client has joined and with what auth payload.
//! Membership does not survive a connection drop: on disconnect every entry
//! is marked stale and must be replayed (a fresh `phx_join`) before the
//! topic is usable again. Entries are removed only by a completed leave or
//! an explicit client disconnect.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;

/// One joined (or stale) topic.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Membership {
    pub topic: String,
    /// Ref of the join request that established (or will re-establish) it.
    pub join_ref: String,
    /// False while awaiting a join reply or after a connection drop.
    pub joined: bool,
    /// Auth payload to resend on replay.
    pub auth_payload: Value,
}

/// Concurrency-safe table of channel memberships.
#[derive(Debug, Default)]
pub(crate) struct MembershipTable {
    channels: Mutex<HashMap<String, Membership>>,
}

impl MembershipTable {
    pub(crate) fn new() -> Self {
        MembershipTable::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<String, Membership>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the topic is currently a live member.
    pub(crate) fn is_joined(&self, topic: &str) -> bool {
        self.channels().get(topic).is_some_and(|m| m.joined)
    }

    /// Whether the topic has a record at all, live or stale.
    pub(crate) fn contains(&self, topic: &str) -> bool {
        self.channels().contains_key(topic)
    }

    /// Records a successful join.
    pub(crate) fn record_joined(&self, topic: &str, join_ref: &str, auth_payload: Value) {
        self.channels().insert(
            topic.to_string(),
            Membership {
                topic: topic.to_string(),
                join_ref: join_ref.to_string(),
                joined: true,
                auth_payload,
            },
        );
    }

    /// Marks a single topic stale (e.g. after a server-side channel crash).
    pub(crate) fn mark_stale(&self, topic: &str) -> bool {
        match self.channels().get_mut(topic) {
            Some(m) => {
                m.joined = false;
                true
            }
            None => false,
        }
    }

    /// Marks every membership stale after a connection drop.
    pub(crate) fn mark_all_stale(&self) {
        for m in self.channels().values_mut() {
            m.joined = false;
        }
    }

    /// Topics that need a join replay, with their recorded auth payloads.
    pub(crate) fn stale(&self) -> Vec<(String, Value)> {
        self.channels()
            .values()
            .filter(|m| !m.joined)
            .map(|m| (m.topic.clone(), m.auth_payload.clone()))
            .collect()
    }

    /// Removes a membership after a completed leave.
    pub(crate) fn remove(&self, topic: &str) -> Option<Membership> {
        self.channels().remove(topic)
    }

    /// Drops every membership (explicit disconnect).
    pub(crate) fn clear(&self) {
        self.channels().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.channels().len()
    }
}
