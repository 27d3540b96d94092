//! Durable storage plus best-effort broadcast to live subscribers
//! (§4.7). Storage is the record of truth — exactly-once; the broadcast
//! channel is a convenience notification a consumer may have missed, in
//! which case it recovers by querying the durable table.

use std::sync::Arc;

use covenant_core::events::{CanonicalEvent, EventStatus};
use covenant_core::ids::{now, Id};
use covenant_state::StateDb;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::error::EventError;

const BROADCAST_CAPACITY: usize = 1024;

/// Publishes canonical events durably and best-effort-broadcasts them to
/// whoever is subscribed at publish time.
pub struct EventBus {
    db: Arc<StateDb>,
    sender: broadcast::Sender<CanonicalEvent>,
    max_retry_count: u32,
}

impl EventBus {
    pub fn new(db: Arc<StateDb>, max_retry_count: u32) -> Self {
        let (sender, _receiver) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            db,
            sender,
            max_retry_count,
        }
    }

    /// A fresh subscription cursor. The caller recovers anything
    /// published between subscribing and actually polling by replaying
    /// from `iter_events_from`.
    pub fn subscribe(&self) -> broadcast::Receiver<CanonicalEvent> {
        self.sender.subscribe()
    }

    pub fn publish(
        &self,
        event_type: &str,
        entity_type: &str,
        entity_id: Id,
        payload: serde_json::Value,
    ) -> Result<CanonicalEvent, EventError> {
        let sequence_number = self.db.next_sequence("canonical_events")?;
        let event = CanonicalEvent {
            id: Id::new(),
            sequence_number,
            created_at: now(),
            event_type: event_type.to_string(),
            schema_version: covenant_core::constants::CANONICAL_EVENT_SCHEMA_VERSION.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            payload,
            status: EventStatus::Pending,
            retry_count: 0,
        };
        self.db.put_event(&event)?;
        // Best-effort: no receivers is not an error, it just means
        // nobody was listening live.
        let _ = self.sender.send(event.clone());
        info!(sequence_number, event_type, "published canonical event");
        Ok(event)
    }

    /// Drains every PENDING/RETRYING event from `from_sequence` onward
    /// and hands each to `handler`. On success marks it Delivered; on
    /// failure increments `retry_count` and marks Retrying, or
    /// DeadLetter once the retry budget is exhausted.
    pub fn drain_pending<F>(&self, from_sequence: u64, mut handler: F) -> Result<DrainSummary, EventError>
    where
        F: FnMut(&CanonicalEvent) -> Result<(), String>,
    {
        let mut summary = DrainSummary::default();
        for mut event in self.db.iter_events_from(from_sequence)? {
            if !matches!(event.status, EventStatus::Pending | EventStatus::Retrying) {
                continue;
            }
            match handler(&event) {
                Ok(()) => {
                    event.status = EventStatus::Delivered;
                    summary.delivered += 1;
                }
                Err(reason) => {
                    event.retry_count += 1;
                    if event.is_exhausted(self.max_retry_count) {
                        event.status = EventStatus::DeadLetter;
                        summary.dead_lettered += 1;
                        warn!(
                            sequence_number = event.sequence_number,
                            reason, "event moved to dead letter"
                        );
                    } else {
                        event.status = EventStatus::Retrying;
                        summary.retried += 1;
                    }
                }
            }
            self.db.put_event(&event)?;
        }
        Ok(summary)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: u32,
    pub retried: u32,
    pub dead_lettered: u32,
}
