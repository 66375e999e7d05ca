// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Event router for inbound frames.
//!
//! Classifies every decoded envelope: correlated replies settle their
//! pending request, broadcast wrappers fan out to the typed subscriber
//! streams, channel-level errors mark memberships stale. Anything the
//! router cannot make sense of is logged and dropped; the receive loop
//! never dies on bad input.

use tracing::{debug, warn};

use chatlink_core::envelope::{
    Envelope, Reply, ReplyStatus, EVENT_BROADCAST, EVENT_CLOSE, EVENT_ERROR, EVENT_HEARTBEAT,
    EVENT_REPLY,
};
use chatlink_core::message::{EVENT_TYPE_NEW_MESSAGE, EVENT_TYPE_STATUS_CHANGED};
use chatlink_core::{Broadcast, ChatMessage, StatusChange};

use crate::error::{ClientError, ErrorEvent};
use crate::state::{BroadcastEvent, ClientInner};

/// Routes one raw inbound frame.
pub(crate) fn route(inner: &ClientInner, text: &str) {
    let envelope = match Envelope::from_json(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "dropping undecodable frame");
            return;
        }
    };

    match envelope.event.as_str() {
        EVENT_REPLY => handle_reply(inner, &envelope),
        EVENT_BROADCAST => handle_broadcast(inner, &envelope),
        EVENT_ERROR => handle_channel_down(inner, &envelope, "channel errored"),
        EVENT_CLOSE => handle_channel_down(inner, &envelope, "channel closed by server"),
        EVENT_HEARTBEAT => {
            // Server heartbeat echo; nothing to correlate
        }
        other => {
            debug!(topic = %envelope.topic, event = %other, "ignoring unrecognized frame");
        }
    }
}

fn handle_reply(inner: &ClientInner, envelope: &Envelope) {
    let Some(reference) = envelope.reference.as_deref().filter(|r| !r.is_empty()) else {
        debug!(topic = %envelope.topic, "reply without ref, dropping");
        return;
    };

    match Reply::from_payload(&envelope.payload) {
        Ok(reply) => {
            let settled = match reply.status {
                ReplyStatus::Ok => inner.pending.resolve(reference, reply.response),
                ReplyStatus::Error => inner
                    .pending
                    .reject(reference, ClientError::ServerRejected(reply.reason())),
            };
            if !settled {
                // Duplicate or late reply; the first outcome already won
                debug!(reference = %reference, "reply for unknown or settled ref");
            }
        }
        Err(e) => {
            warn!(reference = %reference, error = %e, "reply payload malformed");
            inner
                .pending
                .reject(reference, ClientError::MalformedResponse(e.to_string()));
        }
    }
}

fn handle_broadcast(inner: &ClientInner, envelope: &Envelope) {
    let broadcast = match Broadcast::from_payload(&envelope.payload) {
        Ok(broadcast) => broadcast,
        Err(e) => {
            warn!(topic = %envelope.topic, error = %e, "dropping malformed broadcast");
            return;
        }
    };

    match broadcast.event_type.as_str() {
        EVENT_TYPE_NEW_MESSAGE => {
            match serde_json::from_value::<ChatMessage>(broadcast.payload) {
                Ok(message) => {
                    debug!(id = %message.id, "new message delivered");
                    // Counters bump before publish so subscribers observe
                    // the incremented value immediately
                    inner.deliver_message(message);
                }
                Err(e) => warn!(error = %e, "dropping malformed new_message"),
            }
        }
        EVENT_TYPE_STATUS_CHANGED => {
            match serde_json::from_value::<StatusChange>(broadcast.payload) {
                Ok(change) => inner.publish_status(change),
                Err(e) => warn!(error = %e, "dropping malformed status change"),
            }
        }
        _ => {
            // Unknown discriminators go to the catch-all stream, not the floor
            inner.publish_catchall(BroadcastEvent {
                topic: envelope.topic.clone(),
                event_type: broadcast.event_type,
                payload: broadcast.payload,
            });
        }
    }
}

fn handle_channel_down(inner: &ClientInner, envelope: &Envelope, message: &str) {
    if inner.channels.mark_stale(&envelope.topic) {
        warn!(topic = %envelope.topic, "{message}");
        inner.emit_error(ErrorEvent::Channel {
            topic: envelope.topic.clone(),
            message: message.to_string(),
        });
    } else {
        debug!(topic = %envelope.topic, "{message} for unknown topic");
    }
}
