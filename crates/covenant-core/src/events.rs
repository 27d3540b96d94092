//! Canonical event bus types — §4.7 `CanonicalEvent`.

use serde::{Deserialize, Serialize};

use crate::ids::{Id, Timestamp};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Pending,
    Delivered,
    Retrying,
    DeadLetter,
}

/// A durable, ordered fact about something that happened, independent of
/// who (if anyone) was subscribed at the time. Storage first, broadcast
/// best-effort: a subscriber that was offline replays from
/// `sequence_number` rather than losing the event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub id: Id,
    pub sequence_number: u64,
    pub created_at: Timestamp,

    pub event_type: String,
    pub schema_version: String,
    pub entity_type: String,
    pub entity_id: Id,
    pub payload: serde_json::Value,
    pub status: EventStatus,
    pub retry_count: u32,
}

impl CanonicalEvent {
    pub fn is_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }
}

/// A live subscriber's cursor into the durable event log, used to resume
/// best-effort broadcast after a disconnect without replaying from zero.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Id,
    pub subscriber_id: Id,
    pub event_types: Vec<String>,
    pub last_delivered_sequence: u64,
}
